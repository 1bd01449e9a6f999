use super::types::EncodeJob;
use crate::engine::hardware::EncoderBackend;
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Default output container extension
pub const DEFAULT_CONTAINER: &str = "mkv";

/// ffmpeg muxer for an output extension. Unknown extensions get Matroska,
/// which can hold every stream type we copy.
pub fn muxer_for_extension(ext: Option<&OsStr>) -> &'static str {
    let ext = ext
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "mp4",
        "mov" => "mov",
        "avi" => "avi",
        _ => "matroska",
    }
}

/// Build the ffmpeg argument list for one encode.
///
/// Every input stream is kept: video is re-encoded with the backend's HEVC
/// encoder, everything else (audio, subtitles, data, attachments) is copied,
/// along with metadata and chapters. Progress goes to stderr via `-stats`.
pub fn build_encode_args(
    source: &Path,
    dest: &Path,
    backend: EncoderBackend,
    quality: u32,
    preset: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error", "-stats"]
        .into_iter()
        .map(OsString::from)
        .collect();

    if backend == EncoderBackend::X265 {
        args.push("-threads".into());
        args.push("0".into());
    }

    args.push("-i".into());
    args.push(source.as_os_str().to_owned());

    for arg in [
        "-map",
        "0",
        "-map_metadata",
        "0",
        "-map_chapters",
        "0",
        "-c",
        "copy",
        "-c:v",
        backend.ffmpeg_encoder(),
    ] {
        args.push(arg.into());
    }

    args.extend(backend.encoder_args(quality, preset).into_iter().map(OsString::from));

    args.push("-f".into());
    args.push(muxer_for_extension(dest.extension()).into());
    args.push(dest.as_os_str().to_owned());

    args
}

/// Arguments for a job, writing to `write_to` instead of the final destination.
///
/// The muxer still follows the job's destination extension.
pub fn build_job_args(job: &EncodeJob, write_to: &Path) -> Vec<OsString> {
    let mut args = build_encode_args(
        &job.source,
        &job.destination,
        job.backend,
        job.quality,
        &job.preset,
    );
    if let Some(last) = args.last_mut() {
        *last = write_to.as_os_str().to_owned();
    }
    args
}

/// Format a command as a shell-safe string for display
pub fn format_command(program: &Path, args: &[OsString]) -> String {
    let words: Vec<String> = std::iter::once(program.as_os_str())
        .chain(args.iter().map(|a| a.as_os_str()))
        .map(|a| a.to_string_lossy().to_string())
        .collect();

    shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
}
