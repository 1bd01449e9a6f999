// Drives one encoder process to completion while rendering live progress

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::{
    EncodeJob, EncodeLog, EncodeOutcome, ProcessExit, ProgressSample, build_job_args,
    format_command,
};

/// How often the driving loop wakes to check for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of non-progress status lines kept for failure diagnostics
const DIAGNOSTIC_TAIL: usize = 20;

/// Shared flag set by the Ctrl+C handler
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Route Ctrl+C to this flag. Can only be installed once per process.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.cancel()).context("Failed to set Ctrl+C handler")
    }
}

/// A running encoder process as seen by the tracker
pub trait EncodeProcess {
    /// Hand over the status channel (ffmpeg's stderr). Only the first call returns it.
    fn take_status_stream(&mut self) -> Option<Box<dyn Read + Send>>;

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    /// Forcefully terminate and reap the process
    fn kill(&mut self) -> io::Result<()>;
}

impl EncodeProcess for Child {
    fn take_status_stream(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(Child::try_wait(self)?.map(ProcessExit::from))
    }

    fn kill(&mut self) -> io::Result<()> {
        // The child may already have exited on its own SIGINT
        let _ = Child::kill(self);
        self.wait().map(|_| ())
    }
}

/// Read `reader` and call `on_line` for every line. ffmpeg redraws its status
/// line with `\r`, so both `\r` and `\n` terminate a line.
pub fn for_each_status_line<R, F>(reader: R, mut on_line: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(String) -> bool,
{
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }

        let consumed = buf.len();
        for &byte in buf {
            if byte == b'\r' || byte == b'\n' {
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).to_string();
                    pending.clear();
                    if !on_line(line) {
                        return Ok(());
                    }
                }
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }

    if !pending.is_empty() {
        on_line(String::from_utf8_lossy(&pending).to_string());
    }
    Ok(())
}

/// Live progress renderer and process supervisor for one encode
pub struct ProgressTracker<W: Write> {
    console: W,
    cancel: CancelFlag,
    sample: ProgressSample,
}

impl<W: Write> ProgressTracker<W> {
    pub fn new(console: W, cancel: CancelFlag) -> Self {
        Self {
            console,
            cancel,
            sample: ProgressSample::new(),
        }
    }

    /// Latest elapsed/speed values seen on the status stream
    pub fn sample(&self) -> ProgressSample {
        self.sample
    }

    pub fn console(&self) -> &W {
        &self.console
    }

    pub fn into_console(self) -> W {
        self.console
    }

    fn draw(&mut self, line: &str) {
        // Console write failures must not abort an encode
        let _ = write!(self.console, "\r{}", line);
        let _ = self.console.flush();
    }

    fn finish_line(&mut self) {
        let _ = writeln!(self.console);
        let _ = self.console.flush();
    }

    /// Drive `process` until its status stream ends and it exits, or until the
    /// user cancels. `total_secs` is the probed duration, if known.
    pub fn run<P: EncodeProcess + ?Sized>(
        &mut self,
        process: &mut P,
        total_secs: Option<f64>,
    ) -> Result<EncodeOutcome> {
        self.sample = ProgressSample::new();
        let total_secs = total_secs.filter(|t| *t > 0.0);

        let stream = process
            .take_status_stream()
            .context("Encoder process has no status stream")?;

        let (tx, rx) = mpsc::channel::<String>();
        let reader = thread::spawn(move || {
            // Stop reading once the receiver is gone
            for_each_status_line(stream, |line| tx.send(line).is_ok())
        });

        let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL);
        let mut rendered = false;

        loop {
            if self.cancel.is_cancelled() {
                return self.stop(process, rendered);
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    if self.sample.ingest(&line) {
                        let text = self.sample.render(total_secs);
                        self.draw(&text);
                        rendered = true;
                    } else {
                        if diagnostics.len() == DIAGNOSTIC_TAIL {
                            diagnostics.pop_front();
                        }
                        diagnostics.push_back(line);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if let Ok(Err(e)) = reader.join() {
            tracing::debug!(error = %e, "status stream ended with a read error");
        }

        let exit = loop {
            if self.cancel.is_cancelled() {
                return self.stop(process, rendered);
            }
            match process
                .try_wait()
                .context("Failed to wait for encoder process")?
            {
                Some(exit) => break exit,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        if exit.success() {
            if let Some(total) = total_secs {
                let text = self.sample.render_complete(total);
                self.draw(&text);
                rendered = true;
            }
            if rendered {
                self.finish_line();
            }
            Ok(EncodeOutcome::Succeeded)
        } else {
            if rendered {
                self.finish_line();
            }
            Ok(EncodeOutcome::Failed {
                exit_code: exit.code,
                diagnostics: Vec::from(diagnostics).join("\n"),
            })
        }
    }

    fn stop<P: EncodeProcess + ?Sized>(
        &mut self,
        process: &mut P,
        rendered: bool,
    ) -> Result<EncodeOutcome> {
        if let Err(e) = process.kill() {
            tracing::warn!(error = %e, "failed to kill encoder process");
        }
        if rendered {
            self.finish_line();
        }
        Ok(EncodeOutcome::Cancelled)
    }
}

/// Runs one job's encode; the batch runner only sees this seam
pub trait Transcoder {
    fn transcode(&mut self, job: &EncodeJob, total_secs: Option<f64>) -> Result<EncodeOutcome>;
}

/// `Transcoder` that spawns ffmpeg and tracks it on the console.
///
/// Output goes to a `.partial` file that is renamed onto the destination
/// only after a successful exit.
pub struct FfmpegTranscoder<W: Write> {
    ffmpeg: PathBuf,
    tracker: ProgressTracker<W>,
    log: Option<EncodeLog>,
}

impl<W: Write> FfmpegTranscoder<W> {
    pub fn new(ffmpeg: impl Into<PathBuf>, console: W, cancel: CancelFlag) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            tracker: ProgressTracker::new(console, cancel),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Option<EncodeLog>) -> Self {
        self.log = log;
        self
    }

    fn log(&self, message: &str) {
        if let Some(log) = &self.log {
            log.note(message);
        }
    }

    fn spawn(&self, args: &[OsString]) -> Result<Child> {
        Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.ffmpeg.display()))
    }
}

impl<W: Write> Transcoder for FfmpegTranscoder<W> {
    fn transcode(&mut self, job: &EncodeJob, total_secs: Option<f64>) -> Result<EncodeOutcome> {
        let partial = job.partial_path();
        let args = build_job_args(job, &partial);
        let command_line = format_command(&self.ffmpeg, &args);

        tracing::debug!(command = %command_line, "starting encode");
        self.log(&format!(
            "=== Encoding Job ===\n{}\n{}",
            job.source.display(),
            command_line
        ));

        let mut child = self.spawn(&args)?;
        let outcome = self.tracker.run(&mut child, total_secs)?;

        match &outcome {
            EncodeOutcome::Succeeded => {
                std::fs::rename(&partial, &job.destination).with_context(|| {
                    format!(
                        "Failed to move {} to {}",
                        partial.display(),
                        job.destination.display()
                    )
                })?;
            }
            EncodeOutcome::Failed {
                exit_code,
                diagnostics,
            } => {
                self.log(&format!(
                    "[failed] {} (exit code {:?})\n{}",
                    job.source.display(),
                    exit_code,
                    diagnostics
                ));
                remove_partial(&partial);
            }
            EncodeOutcome::Cancelled => {
                self.log(&format!("[cancelled] {}", job.source.display()));
                remove_partial(&partial);
            }
        }

        Ok(outcome)
    }
}

fn remove_partial(partial: &std::path::Path) {
    if partial.exists() {
        if let Err(e) = std::fs::remove_file(partial) {
            tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial output");
        }
    }
}
