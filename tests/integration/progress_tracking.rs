// ProgressTracker driving scripted encoder processes

use crate::common::{EndlessStatus, FakeProbe, ScriptedProcess, touch};
use anyhow::Result;
use hevc_batch::engine::batch::{BatchOptions, BatchRunner};
use hevc_batch::engine::hardware::EncoderBackend;
use hevc_batch::engine::worker::{CancelFlag, ProgressTracker, Transcoder};
use hevc_batch::engine::{EncodeJob, EncodeOutcome, ProgressSample};
use tempfile::TempDir;

/// Transcoder that feeds a fixed ffmpeg status stream through a real tracker
struct ReplayTranscoder {
    tracker: ProgressTracker<Vec<u8>>,
    stream: String,
    exit: i32,
    samples: Vec<ProgressSample>,
    destinations: Vec<std::path::PathBuf>,
}

impl ReplayTranscoder {
    fn new(stream: &str, exit: i32) -> Self {
        Self {
            tracker: ProgressTracker::new(Vec::new(), CancelFlag::new()),
            stream: stream.to_string(),
            exit,
            samples: Vec::new(),
            destinations: Vec::new(),
        }
    }
}

impl Transcoder for ReplayTranscoder {
    fn transcode(&mut self, job: &EncodeJob, total_secs: Option<f64>) -> Result<EncodeOutcome> {
        let mut process = ScriptedProcess::new(&self.stream, self.exit);
        let outcome = self.tracker.run(&mut process, total_secs)?;
        self.samples.push(self.tracker.sample());
        self.destinations.push(job.destination.clone());
        Ok(outcome)
    }
}

#[test]
fn test_movie_half_done_at_double_speed() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "movie.mp4");
    let out_root = dir.path().join("hevc");

    let probe = FakeProbe::default().with_duration("movie.mp4", 120.0);
    let mut transcoder = ReplayTranscoder::new(
        "frame=1500 fps=50 q=28.0 size=1024kB time=00:01:00.00 bitrate=139.8kbits/s speed=2.0x\r",
        0,
    );
    let options = BatchOptions::new(dir.path(), &out_root, EncoderBackend::X265);
    let summary = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(transcoder.destinations, vec![out_root.join("movie_x265.mkv")]);

    let sample = transcoder.samples[0];
    assert_eq!(sample.elapsed_secs, 60.0);
    assert_eq!(sample.speed, 2.0);
    assert_eq!(sample.fraction(120.0), 0.5);
    assert_eq!(sample.eta(120.0), "30s");

    let console = String::from_utf8(transcoder.tracker.into_console()).unwrap();
    assert!(console.contains(" 50.0%  speed 2.00x  ETA      30s"), "got: {:?}", console);
    assert!(console.contains("100.0%"));
}

#[test]
fn test_status_lines_interleaved_with_noise() {
    let stream = "Input #0, matroska,webm, from 'in.mkv':\n\
                  frame=10 time=00:00:01.5 speed=0.5x\r\
                  frame=20 time=00:00:03.05 speed=N/A\r\
                  [libx265 @ 0x55] frame I: 1\n";
    let mut process = ScriptedProcess::new(stream, 0);
    let mut tracker = ProgressTracker::new(Vec::new(), CancelFlag::new());

    let outcome = tracker.run(&mut process, Some(10.0)).unwrap();
    assert_eq!(outcome, EncodeOutcome::Succeeded);

    let sample = tracker.sample();
    assert!((sample.elapsed_secs - 3.05).abs() < 1e-9);
    assert_eq!(sample.speed, 0.5, "a line without a speed token keeps the last speed");
}

#[test]
fn test_waits_for_exit_after_stream_closes() {
    let mut process = ScriptedProcess::new("time=00:00:05.00 speed=1.0x\n", 0);
    process.pending_polls = 3;
    let mut tracker = ProgressTracker::new(Vec::new(), CancelFlag::new());

    assert_eq!(tracker.run(&mut process, Some(5.0)).unwrap(), EncodeOutcome::Succeeded);
    assert_eq!(process.pending_polls, 0);
}

#[test]
fn test_failed_encode_reports_tail() {
    let mut process = ScriptedProcess::new(
        "time=00:00:02.00 speed=1.1x\r\
         Error while opening encoder for output stream #0:0\n",
        187,
    );
    let mut tracker = ProgressTracker::new(Vec::new(), CancelFlag::new());

    match tracker.run(&mut process, Some(60.0)).unwrap() {
        EncodeOutcome::Failed {
            exit_code,
            diagnostics,
        } => {
            assert_eq!(exit_code, Some(187));
            assert_eq!(
                diagnostics,
                "Error while opening encoder for output stream #0:0"
            );
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_ctrl_c_mid_encode_kills_process() {
    let cancel = CancelFlag::new();
    let mut process = ScriptedProcess::from_reader(EndlessStatus::new(cancel.clone()), None);
    let mut tracker = ProgressTracker::new(Vec::new(), cancel.clone());

    let outcome = tracker.run(&mut process, Some(3600.0)).unwrap();

    assert_eq!(outcome, EncodeOutcome::Cancelled);
    assert!(process.killed);
    assert!(cancel.is_cancelled());
    assert_eq!(tracker.sample().elapsed_secs, 4.0);
}
