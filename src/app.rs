use crate::cli::{Cli, Commands};
use hevc_batch::config::Config;
use hevc_batch::engine::{
    self, EncodeLog,
    batch::{BatchOptions, BatchRunner},
    hardware::{self, EncoderBackend, FfmpegCapabilityProbe},
    probe::{Ffprobe, MediaProbe},
    worker::{CancelFlag, FfmpegTranscoder},
};
use hevc_batch::stats::format_duration;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Exit status when the run was interrupted with Ctrl+C
pub const EXIT_STOPPED: i32 = 130;

pub fn run(cli: Cli) {
    if let Some(command) = &cli.command {
        match command {
            Commands::CheckFfmpeg => handle_check_ffmpeg(&cli),
            Commands::Detect => handle_detect(&cli),
            Commands::Probe { file } => handle_probe(&cli, file),
            Commands::DryRun => handle_dry_run(&cli),
            Commands::InitConfig => handle_init_config(&cli),
        }
        return;
    }

    handle_encode(&cli);
}

fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Config::config_path(),
    }
}

/// Apply command-line overrides on top of the loaded config
pub fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(input) = &cli.input {
        config.paths.input_dir = input.clone();
    }
    if let Some(output) = &cli.output {
        config.paths.output_dir = output.clone();
    }
    if let Some(quality) = cli.quality {
        config.encoding.quality = quality;
    }
    if let Some(preset) = &cli.preset {
        config.encoding.preset = preset.to_ascii_lowercase();
    }
    if let Some(encoder) = &cli.encoder {
        config.encoding.encoder = encoder.to_ascii_lowercase();
    }
    if cli.recursive {
        config.batch.recursive = true;
    }
    if cli.flatten {
        config.batch.mirror_structure = false;
    }
    if cli.keep_extension {
        config.batch.force_container = false;
    }
    if cli.reencode_existing {
        config.batch.skip_if_output_exists = false;
    }
    if cli.skip_hevc {
        config.batch.skip_if_target_codec = true;
    }
}

/// Load, override and validate the config, exiting with status 1 on any problem
fn load_config(cli: &Cli) -> Config {
    let path = match config_path(cli) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    let mut config = match Config::load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    apply_overrides(&mut config, cli);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    config
}

/// Use the configured backend, or probe the hardware once
fn resolve_backend(config: &Config) -> EncoderBackend {
    match config.forced_backend() {
        Some(backend) => {
            tracing::info!(backend = backend.id(), "encoder forced by configuration");
            backend
        }
        None => hardware::detect(&FfmpegCapabilityProbe::new(&config.tools.ffmpeg)),
    }
}

pub fn batch_options(config: &Config, backend: EncoderBackend) -> BatchOptions {
    BatchOptions {
        input_root: config.paths.input_dir.clone(),
        output_root: config.paths.output_dir.clone(),
        backend,
        quality: config.encoding.quality,
        preset: config.encoding.preset.clone(),
        recursive: config.batch.recursive,
        mirror_structure: config.batch.mirror_structure,
        force_container: config.batch.force_container,
        skip_if_output_exists: config.batch.skip_if_output_exists,
        skip_if_target_codec: config.batch.skip_if_target_codec,
    }
}

pub fn banner(config: &Config, backend: EncoderBackend) -> String {
    let line = "=".repeat(60);
    [
        line.clone(),
        format!(" {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        line.clone(),
        format!(" Input   : {}", config.paths.input_dir.display()),
        format!(" Output  : {}", config.paths.output_dir.display()),
        format!(" Encoder : {}", backend.display_name()),
        format!(" Suffix  : {}", backend.suffix()),
        format!(" Quality : {}", config.encoding.quality),
        format!(" Preset  : {}", config.encoding.preset),
        " Workers : 1".to_string(),
        line,
    ]
    .join("\n")
}

fn ensure_tools_or_exit(config: &Config) {
    if let Err(e) = engine::ensure_tools(&config.tools.ffmpeg, &config.tools.ffprobe) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn handle_encode(cli: &Cli) {
    let config = load_config(cli);
    ensure_tools_or_exit(&config);

    let backend = resolve_backend(&config);
    println!("{}", banner(&config, backend));

    let cancel = CancelFlag::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        tracing::warn!(error = %e, "Ctrl+C will not stop encodes cleanly");
    }

    let options = batch_options(&config, backend);
    let log = config
        .logging
        .encode_log
        .then(|| EncodeLog::in_dir(&options.output_root));

    let probe = Ffprobe::new(&config.tools.ffprobe);
    let mut transcoder =
        FfmpegTranscoder::new(&config.tools.ffmpeg, io::stdout(), cancel.clone()).with_log(log);
    let mut runner = BatchRunner::new(options, &probe, &mut transcoder, cancel, io::stdout());

    let summary = match runner.run() {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    println!("{}", summary.done_line());
    if summary.stopped_by_user {
        process::exit(EXIT_STOPPED);
    }
}

fn handle_check_ffmpeg(cli: &Cli) {
    let config = load_config(cli);
    match engine::ensure_tools(&config.tools.ffmpeg, &config.tools.ffprobe) {
        Ok(versions) => {
            println!("ffmpeg found: {}", versions.ffmpeg);
            println!("ffprobe found: {}", versions.ffprobe);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_detect(cli: &Cli) {
    let config = load_config(cli);
    ensure_tools_or_exit(&config);

    let backend = resolve_backend(&config);
    println!(
        "Encoder: {} ({}), output suffix {}",
        backend.display_name(),
        backend.ffmpeg_encoder(),
        backend.suffix()
    );
}

fn handle_probe(cli: &Cli, file: &Path) {
    let config = load_config(cli);
    let probe = Ffprobe::new(&config.tools.ffprobe);

    match probe.duration(file) {
        Some(secs) => println!("Duration: {:.2} seconds ({})", secs, format_duration(secs)),
        None => println!("Duration: unknown"),
    }
    match probe.video_codec(file) {
        Some(codec) => println!("Video codec: {}", codec),
        None => println!("Video codec: unknown"),
    }
}

fn handle_dry_run(cli: &Cli) {
    let config = load_config(cli);
    let backend = match config.forced_backend() {
        Some(backend) => backend,
        None => {
            ensure_tools_or_exit(&config);
            resolve_backend(&config)
        }
    };
    let options = batch_options(&config, backend);

    println!(
        "Dry run: building ffmpeg commands for {}",
        options.input_root.display()
    );

    let files = match engine::scan(&options.input_root, &options.scan_options()) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error scanning directory: {:#}", e);
            process::exit(1);
        }
    };

    let probe = Ffprobe::new(&config.tools.ffprobe);
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for source in &files {
        let job = options.job_for(source);
        if !claimed.insert(job.destination.clone()) {
            println!(
                "# would fail (output name already used): {}",
                job.source.display()
            );
            continue;
        }
        if let Some(reason) = options.skip_reason(&job, &probe) {
            println!("# skip ({}): {}", reason.describe(), job.source.display());
            continue;
        }
        let args = engine::build_job_args(&job, &job.destination);
        println!("{}", engine::format_command(&config.tools.ffmpeg, &args));
    }
    println!("Total files: {}", files.len());
}

fn handle_init_config(cli: &Cli) {
    let path = match config_path(cli) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if path.exists() {
        match Config::load_from(&path) {
            Ok(cfg) => {
                println!("Config loaded successfully from {}", path.display());
                println!("{:#?}", cfg);
            }
            Err(e) => {
                eprintln!("Config invalid: {:#}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Creating default config...");
    if let Err(err) = Config::default().save_to(&path) {
        eprintln!("Failed to save default config: {:#}", err);
        process::exit(1);
    }
    println!("Default config saved to {}", path.display());
}
