// Sequential batch driver: enumerate inputs, apply skip policies, encode one at a time

use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::EngineError;
use super::hardware::EncoderBackend;
use super::probe::{MediaProbe, is_target_codec};
use super::worker::{CancelFlag, Transcoder};
use super::{
    EncodeJob, EncodeOutcome, OutputLayout, ScanOptions, derive_output_path,
    output_is_up_to_date, scan,
};
use crate::stats::{RunSummary, format_duration};

/// Everything a batch run needs to know, resolved from config and CLI
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub backend: EncoderBackend,
    pub quality: u32,
    pub preset: String,
    pub recursive: bool,
    pub mirror_structure: bool,
    pub force_container: bool,
    pub skip_if_output_exists: bool,
    pub skip_if_target_codec: bool,
}

impl BatchOptions {
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        backend: EncoderBackend,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            backend,
            quality: 21,
            preset: "slow".to_string(),
            recursive: false,
            mirror_structure: true,
            force_container: true,
            skip_if_output_exists: true,
            skip_if_target_codec: false,
        }
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout {
            input_root: self.input_root.clone(),
            output_root: self.output_root.clone(),
            mirror_structure: self.mirror_structure,
            force_container: self.force_container,
        }
    }

    /// The output root expressed under the input root, when it is nested there
    fn nested_output_dir(&self) -> Option<PathBuf> {
        let input = fs::canonicalize(&self.input_root).ok()?;
        let output = fs::canonicalize(&self.output_root).ok()?;
        let rel = output.strip_prefix(&input).ok()?;
        Some(self.input_root.join(rel))
    }

    /// Scan options for this run; must be called after the output root exists
    pub fn scan_options(&self) -> ScanOptions {
        let exclude_dir = self.nested_output_dir();
        // Outputs land next to their sources only when both roots are the same
        let same_root = exclude_dir
            .as_deref()
            .is_some_and(|dir| dir == self.input_root.as_path());
        ScanOptions {
            recursive: self.recursive,
            exclude_dir,
            skip_own_outputs: same_root,
        }
    }

    /// Decide whether `job` can be skipped under the configured policies
    pub fn skip_reason(&self, job: &EncodeJob, probe: &dyn MediaProbe) -> Option<SkipReason> {
        if self.skip_if_output_exists && output_is_up_to_date(&job.source, &job.destination) {
            return Some(SkipReason::OutputUpToDate);
        }

        if self.skip_if_target_codec {
            if let Some(codec) = probe.video_codec(&job.source) {
                if is_target_codec(&codec) {
                    return Some(SkipReason::AlreadyTargetCodec);
                }
            }
        }

        None
    }

    pub fn job_for(&self, source: &Path) -> EncodeJob {
        let destination = derive_output_path(source, &self.layout(), self.backend);
        EncodeJob::new(
            source.to_path_buf(),
            destination,
            self.backend,
            self.quality,
            &self.preset,
        )
    }
}

/// Why a file was passed over without encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutputUpToDate,
    AlreadyTargetCodec,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::OutputUpToDate => "output up to date",
            SkipReason::AlreadyTargetCodec => "already HEVC",
        }
    }
}

pub struct BatchRunner<'a, W: Write> {
    options: BatchOptions,
    probe: &'a dyn MediaProbe,
    transcoder: &'a mut dyn Transcoder,
    cancel: CancelFlag,
    console: W,
}

impl<'a, W: Write> BatchRunner<'a, W> {
    pub fn new(
        options: BatchOptions,
        probe: &'a dyn MediaProbe,
        transcoder: &'a mut dyn Transcoder,
        cancel: CancelFlag,
        console: W,
    ) -> Self {
        Self {
            options,
            probe,
            transcoder,
            cancel,
            console,
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn into_console(self) -> W {
        self.console
    }

    fn say(&mut self, line: &str) {
        let _ = writeln!(self.console, "{}", line);
        let _ = self.console.flush();
    }

    /// Create the output root if it is missing
    pub fn prepare_output_root(&self) -> Result<(), EngineError> {
        fs::create_dir_all(&self.options.output_root).map_err(|source| {
            EngineError::OutputRoot {
                path: self.options.output_root.clone(),
                source,
            }
        })
    }

    pub fn skip_reason(&self, job: &EncodeJob) -> Option<SkipReason> {
        self.options.skip_reason(job, self.probe)
    }

    /// Encode every input file in path order and return the tally
    pub fn run(&mut self) -> Result<RunSummary> {
        self.prepare_output_root()?;

        let files = scan(&self.options.input_root, &self.options.scan_options())?;
        let mut summary = RunSummary::default();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        if files.is_empty() {
            self.say("No input videos found.");
            return Ok(summary);
        }

        tracing::info!(count = files.len(), "found input videos");

        for source in files {
            if self.cancel.is_cancelled() {
                summary.stopped_by_user = true;
                break;
            }

            let job = self.options.job_for(&source);
            let name = display_name(&job.source);

            // Flattened layouts can map two sources onto one output name
            if !claimed.insert(job.destination.clone()) {
                tracing::warn!(
                    source = %job.source.display(),
                    destination = %job.destination.display(),
                    "output name already used in this run"
                );
                self.say(&format!(
                    "✗ {} failed\n{} is already the output of another file in this run\n",
                    name,
                    job.destination.display()
                ));
                summary.record_failure();
                continue;
            }

            if let Some(reason) = self.skip_reason(&job) {
                tracing::info!(
                    source = %job.source.display(),
                    reason = reason.describe(),
                    "skipping"
                );
                self.say(&format!("Skipped: {} ({})", name, reason.describe()));
                summary.record_skip();
                continue;
            }

            if let Some(parent) = job.destination.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(dir = %parent.display(), error = %e, "cannot create output directory");
                    self.say(&format!("✗ {} failed\n{}\n", name, e));
                    summary.record_failure();
                    continue;
                }
            }

            let total = self.probe.duration(&job.source);
            self.say(&format!("Encoding: {}", name));
            match total {
                Some(secs) => self.say(&format!("    Duration: {}", format_duration(secs))),
                None => tracing::debug!(source = %job.source.display(), "duration unknown"),
            }

            let outcome = match self.transcoder.transcode(&job, total) {
                Ok(outcome) => outcome,
                Err(e) => EncodeOutcome::Failed {
                    exit_code: None,
                    diagnostics: format!("{:#}", e),
                },
            };

            match outcome {
                EncodeOutcome::Succeeded => {
                    self.say(&format!("✓ {} → {}", name, display_name(&job.destination)));
                    summary.record_success();
                }
                EncodeOutcome::Failed {
                    exit_code,
                    diagnostics,
                } => {
                    tracing::warn!(
                        source = %job.source.display(),
                        exit_code = ?exit_code,
                        "encode failed"
                    );
                    self.say(&format!("✗ {} failed\n{}\n", name, diagnostics));
                    summary.record_failure();
                }
                EncodeOutcome::Cancelled => {
                    self.say("\nStopped by user.");
                    summary.stopped_by_user = true;
                    break;
                }
            }
        }

        Ok(summary)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
