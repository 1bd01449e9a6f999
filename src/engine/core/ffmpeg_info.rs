use crate::engine::error::EngineError;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Run `<tool> -version` and return the first line of its output
pub fn tool_version(program: &Path) -> Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is it installed and in PATH?",
                program.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!(
            "{} -version failed with status: {}",
            program.display(),
            output.status
        );
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Check if ffmpeg is available and return its version
pub fn ffmpeg_version(ffmpeg: &Path) -> Result<String> {
    tool_version(ffmpeg)
}

/// Check if ffprobe is available and return its version
pub fn ffprobe_version(ffprobe: &Path) -> Result<String> {
    tool_version(ffprobe)
}

/// Versions of the external tools a run depends on
#[derive(Debug, Clone)]
pub struct ToolVersions {
    pub ffmpeg: String,
    pub ffprobe: String,
}

/// Confirm both tools can be executed before anything else happens
pub fn ensure_tools(ffmpeg: &Path, ffprobe: &Path) -> Result<ToolVersions, EngineError> {
    let unavailable = |program: &Path, e: anyhow::Error| EngineError::EnvironmentUnavailable {
        tool: program.display().to_string(),
        reason: format!("{:#}", e),
    };

    let ffmpeg_v = ffmpeg_version(ffmpeg).map_err(|e| unavailable(ffmpeg, e))?;
    let ffprobe_v = ffprobe_version(ffprobe).map_err(|e| unavailable(ffprobe, e))?;

    tracing::debug!(ffmpeg = %ffmpeg_v, ffprobe = %ffprobe_v, "external tools available");

    Ok(ToolVersions {
        ffmpeg: ffmpeg_v,
        ffprobe: ffprobe_v,
    })
}

/// Parse the bare `format=duration` value printed by ffprobe.
///
/// Zero, negative, non-finite and non-numeric values mean "unknown".
pub fn parse_duration_output(stdout: &str) -> Option<f64> {
    let value = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    match value.parse::<f64>() {
        Ok(d) if d.is_finite() && d > 0.0 => Some(d),
        _ => None,
    }
}
