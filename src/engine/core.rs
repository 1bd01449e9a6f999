mod ffmpeg_cmd;
mod ffmpeg_info;
mod log;
mod progress;
mod scan;
mod types;

pub use ffmpeg_cmd::{
    DEFAULT_CONTAINER, build_encode_args, build_job_args, format_command, muxer_for_extension,
};
pub use ffmpeg_info::{
    ToolVersions, ensure_tools, ffmpeg_version, ffprobe_version, parse_duration_output,
    tool_version,
};
pub use log::{ENCODE_LOG_NAME, EncodeLog};
pub use progress::{
    BAR_WIDTH, ProgressSample, SPEED_FLOOR, hms_to_seconds, parse_speed_token, parse_time_token,
};
pub use scan::{
    OutputLayout, ScanOptions, derive_output_path, is_own_output, is_video_file,
    output_is_up_to_date, scan, scan_streaming,
};
pub use types::{EncodeJob, EncodeOutcome, ProcessExit};
