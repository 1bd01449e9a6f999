use super::ffmpeg_cmd::DEFAULT_CONTAINER;
use crate::engine::hardware::EncoderBackend;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Video file extensions picked up as inputs
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "m4v"];

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return VIDEO_EXTENSIONS.contains(&ext_str.to_lowercase().as_str());
        }
    }
    false
}

/// Whether a file looks like something this tool already produced
/// (`*_x265.*`, `*_x265_nvenc.*`, or an in-flight `*.partial.*`)
pub fn is_own_output(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    stem.ends_with(".partial")
        || EncoderBackend::ALL
            .iter()
            .any(|b| stem.ends_with(&b.suffix()))
}

/// Options controlling which files a scan returns
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub recursive: bool,
    /// Directory whose contents are never treated as inputs
    pub exclude_dir: Option<PathBuf>,
    /// Drop files named like this tool's outputs. Only needed when outputs
    /// are written next to their sources.
    pub skip_own_outputs: bool,
}

/// Scan a directory for video files and invoke a callback for each file found
pub fn scan_streaming<F>(root: &Path, opts: &ScanOptions, mut on_file: F) -> Result<()>
where
    F: FnMut(PathBuf),
{
    let max_depth = if opts.recursive { usize::MAX } else { 1 };
    let exclude = opts
        .exclude_dir
        .as_ref()
        .filter(|dir| dir.as_path() != root);

    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| exclude.is_none_or(|dir| !e.path().starts_with(dir)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to read {}", root.display()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_video_file(path) {
            continue;
        }
        if opts.skip_own_outputs && is_own_output(path) {
            tracing::info!(path = %path.display(), "skipping file named like an encoded output");
            continue;
        }
        on_file(path.to_path_buf());
    }

    Ok(())
}

/// Scan for video files, sorted by path
pub fn scan(root: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    scan_streaming(root, opts, |path| files.push(path))?;
    files.sort();
    Ok(files)
}

/// How output paths are laid out under the output root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Recreate the input's relative directories under the output root
    pub mirror_structure: bool,
    /// Force the `mkv` extension instead of keeping the source's
    pub force_container: bool,
}

/// Derive `{output_root}/[relative dirs/]{stem}{suffix}.{ext}` for an input
pub fn derive_output_path(input: &Path, layout: &OutputLayout, backend: EncoderBackend) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let ext = if layout.force_container {
        DEFAULT_CONTAINER.to_string()
    } else {
        input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_CONTAINER.to_string())
    };

    let mut dir = layout.output_root.clone();
    if layout.mirror_structure {
        if let Some(rel_parent) = input
            .strip_prefix(&layout.input_root)
            .ok()
            .and_then(|rel| rel.parent())
        {
            dir.push(rel_parent);
        }
    }

    dir.join(format!("{}{}.{}", stem, backend.suffix(), ext))
}

/// True when `output` exists and was modified no earlier than `input`
pub fn output_is_up_to_date(input: &Path, output: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(input), modified(output)) {
        (Some(src), Some(dst)) => dst >= src,
        (None, Some(_)) => true,
        _ => false,
    }
}
