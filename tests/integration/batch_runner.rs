// BatchRunner end to end with fake probe and transcoder

use crate::common::{FakeProbe, RecordingTranscoder, set_age, touch};
use hevc_batch::engine::batch::{BatchOptions, BatchRunner};
use hevc_batch::engine::hardware::EncoderBackend;
use hevc_batch::engine::worker::CancelFlag;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn console(runner: BatchRunner<'_, Vec<u8>>) -> String {
    String::from_utf8(runner.into_console()).unwrap()
}

#[test]
fn test_single_file_software_backend() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "movie.mp4");
    let out_root = dir.path().join("hevc");

    let probe = FakeProbe::default().with_duration("movie.mp4", 120.0);
    let mut transcoder = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), &out_root, EncoderBackend::X265);
    let mut runner = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new());

    let summary = runner.run().unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.done_line(), "Done. Success: 1, Failed: 0");

    let out = console(runner);
    assert!(out.contains("Encoding: movie.mp4"));
    assert!(out.contains("Duration: 2m 0s"));
    assert!(out.contains("movie_x265.mkv"));

    assert_eq!(transcoder.jobs.len(), 1);
    let (job, total) = &transcoder.jobs[0];
    assert_eq!(job.destination, out_root.join("movie_x265.mkv"));
    assert_eq!(job.backend, EncoderBackend::X265);
    assert_eq!(*total, Some(120.0));
    assert!(out_root.join("movie_x265.mkv").exists());
}

#[test]
fn test_failure_does_not_stop_the_batch() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "b_second.mkv");
    touch(dir.path(), "a_first.mkv");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::failing(&["a_first.mkv"]);
    let options = BatchOptions::new(dir.path(), dir.path().join("out"), EncoderBackend::Nvenc);
    let mut runner = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new());

    let summary = runner.run().unwrap();
    assert_eq!((summary.succeeded, summary.failed), (1, 1));

    let out = console(runner);
    assert!(out.contains("a_first.mkv failed"));
    assert!(out.contains("Invalid data found when processing input"));
    assert_eq!(transcoder.sources(), vec!["a_first.mkv", "b_second.mkv"]);
}

#[test]
fn test_up_to_date_output_is_skipped_without_encoding() {
    let dir = TempDir::new().unwrap();
    let source = touch(dir.path(), "movie.mp4");
    let out_root = dir.path().join("hevc");
    let existing = touch(&out_root, "movie_x265.mkv");
    set_age(&source, Duration::from_secs(600));
    set_age(&existing, Duration::from_secs(60));

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), &out_root, EncoderBackend::X265);
    let summary = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
    assert!(transcoder.jobs.is_empty());
}

#[test]
fn test_stale_output_is_reencoded() {
    let dir = TempDir::new().unwrap();
    let source = touch(dir.path(), "movie.mp4");
    let out_root = dir.path().join("hevc");
    let existing = touch(&out_root, "movie_x265.mkv");
    set_age(&existing, Duration::from_secs(600));
    set_age(&source, Duration::from_secs(60));

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), &out_root, EncoderBackend::X265);
    let summary = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    assert_eq!(summary.skipped, 0);
    assert_eq!(transcoder.jobs.len(), 1);
}

#[test]
fn test_second_run_skips_everything() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "one.mov");
    touch(dir.path(), "two.avi");
    let probe = FakeProbe::default();

    let mut first = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), dir.path().join("hevc"), EncoderBackend::Qsv);
    BatchRunner::new(options.clone(), &probe, &mut first, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();
    assert_eq!(first.jobs.len(), 2);

    let mut second = RecordingTranscoder::default();
    let summary = BatchRunner::new(options, &probe, &mut second, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();
    assert_eq!(summary.skipped, 2);
    assert!(second.jobs.is_empty(), "outputs inside the input tree are never inputs");
}

#[test]
fn test_recursive_mirror_structure() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    touch(&input, "top.mp4");
    touch(&input, "season1/ep1.mkv");
    let out_root = dir.path().join("out");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let mut options = BatchOptions::new(&input, &out_root, EncoderBackend::Amf);
    options.recursive = true;
    BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    let destinations: Vec<PathBuf> = transcoder.jobs.iter().map(|(j, _)| j.destination.clone()).collect();
    assert_eq!(
        destinations,
        vec![
            out_root.join("season1").join("ep1_x265_amf.mkv"),
            out_root.join("top_x265_amf.mkv"),
        ]
    );
    assert!(out_root.join("season1").is_dir());
}

#[test]
fn test_flattened_output_keeps_extension() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    touch(&input, "season1/ep1.mp4");
    let out_root = dir.path().join("out");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let mut options = BatchOptions::new(&input, &out_root, EncoderBackend::X265);
    options.recursive = true;
    options.mirror_structure = false;
    options.force_container = false;
    BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    assert_eq!(transcoder.jobs[0].0.destination, out_root.join("ep1_x265.mp4"));
}

#[test]
fn test_hevc_sources_skipped_when_enabled() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "already.mkv");
    touch(dir.path(), "legacy.mkv");

    let probe = FakeProbe::default()
        .with_codec("already.mkv", "hevc")
        .with_codec("legacy.mkv", "h264");
    let mut transcoder = RecordingTranscoder::default();
    let mut options = BatchOptions::new(dir.path(), dir.path().join("out"), EncoderBackend::X265);
    options.skip_if_target_codec = true;
    let summary = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(transcoder.sources(), vec!["legacy.mkv"]);
}

#[test]
fn test_unknown_duration_still_encodes() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "broken.mp4");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), dir.path().join("out"), EncoderBackend::X265);
    let mut runner = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new());
    let summary = runner.run().unwrap();

    assert_eq!(summary.succeeded, 1);
    assert!(!console(runner).contains("Duration:"));
    assert_eq!(transcoder.jobs[0].1, None);
}

#[test]
fn test_cancellation_stops_remaining_files() {
    let dir = TempDir::new().unwrap();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        touch(dir.path(), name);
    }

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder {
        cancel_on: Some("b.mp4".to_string()),
        ..Default::default()
    };
    let options = BatchOptions::new(dir.path(), dir.path().join("out"), EncoderBackend::X265);
    let mut runner = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new());
    let summary = runner.run().unwrap();

    assert!(summary.stopped_by_user);
    assert_eq!((summary.succeeded, summary.failed), (1, 0));
    assert!(console(runner).contains("Stopped by user."));
    assert_eq!(transcoder.sources(), vec!["a.mp4", "b.mp4"]);
}

#[test]
fn test_output_root_cannot_be_created() {
    let dir = TempDir::new().unwrap();
    let blocker = touch(dir.path(), "not_a_dir");
    touch(dir.path(), "movie.mp4");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), blocker.join("hevc"), EncoderBackend::X265);
    let err = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap_err();

    assert!(err.to_string().contains("Failed to create output directory"));
    assert!(transcoder.jobs.is_empty());
    assert!(fs::metadata(&blocker).unwrap().is_file());
}

#[test]
fn test_flattened_name_collision_fails_second_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    touch(&input, "a/ep1.mkv");
    touch(&input, "b/ep1.mkv");
    let out_root = dir.path().join("out");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let mut options = BatchOptions::new(&input, &out_root, EncoderBackend::X265);
    options.recursive = true;
    options.mirror_structure = false;
    let mut runner = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new());
    let summary = runner.run().unwrap();

    assert_eq!((summary.succeeded, summary.failed, summary.skipped), (1, 1, 0));
    assert!(console(runner).contains("is already the output of another file in this run"));
    assert_eq!(transcoder.jobs.len(), 1);
    assert_eq!(transcoder.jobs[0].0.source, input.join("a").join("ep1.mkv"));
}

#[test]
fn test_output_like_names_in_separate_input_dir_are_encoded() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "Show.S01E01_x265.mkv");
    touch(dir.path(), "holiday.partial.mp4");

    let probe = FakeProbe::default();
    let mut transcoder = RecordingTranscoder::default();
    let options = BatchOptions::new(dir.path(), dir.path().join("out"), EncoderBackend::X265);
    let summary = BatchRunner::new(options, &probe, &mut transcoder, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(transcoder.sources(), vec!["Show.S01E01_x265.mkv", "holiday.partial.mp4"]);
}

#[test]
fn test_outputs_written_beside_sources_are_not_reencoded() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "movie.mp4");
    let probe = FakeProbe::default();
    let options = BatchOptions::new(dir.path(), dir.path(), EncoderBackend::X265);

    let mut first = RecordingTranscoder::default();
    BatchRunner::new(options.clone(), &probe, &mut first, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();
    assert!(dir.path().join("movie_x265.mkv").exists());

    let mut second = RecordingTranscoder::default();
    let summary = BatchRunner::new(options, &probe, &mut second, CancelFlag::new(), Vec::new())
        .run()
        .unwrap();
    assert_eq!(summary.total(), 1, "only movie.mp4 is an input");
    assert_eq!(summary.skipped, 1);
    assert!(second.jobs.is_empty());
}
