//! [`JsonLinesSource`] – pose frames from an out-of-process estimator.
//!
//! The estimator (a MediaPipe script, a recorded session, …) writes one JSON
//! object per captured frame:
//!
//! ```text
//! {"landmarks": {"LEFT_SHOULDER": {"x": 0.41, "y": 0.30, "z": -0.1, "visibility": 0.98}, ...}}
//! {"landmarks": [{"x": ..., "y": ...}, ... 33 entries in MediaPipe order ...]}
//! {"landmarks": null}
//! ```
//!
//! A missing or `null` `landmarks` field means no body was detected. Blank
//! lines are skipped. A line that is not valid JSON is logged and delivered as
//! a frame without detection, so a single corrupt line never stops the arm.
//!
//! Lines are read on a dedicated thread so that [`FrameSource::next_frame`]
//! can honour its timeout even when the reader is blocked on I/O.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;

use mimic_types::{Landmark, LandmarkName, MimicError, Pose, PoseFrame};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::frame_source::{Acquisition, FrameSource};

/// Frames the reader thread may parse ahead of the loop.
const READ_AHEAD: usize = 4;

#[derive(Deserialize)]
struct WireFrame {
    #[serde(default)]
    landmarks: Option<WireLandmarks>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireLandmarks {
    Named(BTreeMap<String, Landmark>),
    Indexed(Vec<Landmark>),
}

/// Parse one line of the landmark stream.
///
/// # Errors
///
/// Returns the `serde_json` error when `line` is not a valid frame object.
pub fn parse_frame(line: &str) -> Result<PoseFrame, serde_json::Error> {
    let wire: WireFrame = serde_json::from_str(line)?;
    Ok(match wire.landmarks {
        Some(WireLandmarks::Named(named)) => {
            // Points the mimic does not track are ignored.
            let pose = named
                .into_iter()
                .filter_map(|(name, lm)| name.parse::<LandmarkName>().ok().map(|n| (n, lm)))
                .fold(Pose::new(), |pose, (n, lm)| pose.with(n, lm));
            PoseFrame::detected(pose)
        }
        Some(WireLandmarks::Indexed(list)) => PoseFrame::detected(Pose::from_indexed(&list)),
        None => PoseFrame::empty(),
    })
}

enum LineEvent {
    Frame(PoseFrame),
    Failed(String),
}

/// [`FrameSource`] fed by newline-delimited JSON.
pub struct JsonLinesSource {
    id: String,
    rx: Option<Receiver<LineEvent>>,
    reader: Option<JoinHandle<()>>,
}

impl JsonLinesSource {
    /// Start reading frames from `input` on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::Acquisition`] if the reader thread cannot be
    /// spawned.
    pub fn spawn<R>(id: impl Into<String>, input: R) -> Result<Self, MimicError>
    where
        R: BufRead + Send + 'static,
    {
        let id = id.into();
        let (tx, rx) = mpsc::sync_channel(READ_AHEAD);
        let reader = std::thread::Builder::new()
            .name(format!("landmarks:{id}"))
            .spawn(move || read_lines(input, tx))
            .map_err(|e| MimicError::Acquisition {
                source_id: id.clone(),
                details: format!("failed to start reader thread: {e}"),
            })?;
        Ok(Self {
            id,
            rx: Some(rx),
            reader: Some(reader),
        })
    }

    /// Read frames from the process's standard input.
    pub fn from_stdin() -> Result<Self, MimicError> {
        Self::spawn("stdin", BufReader::new(std::io::stdin()))
    }

    /// Read frames from a file, e.g. a recorded session.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::Acquisition`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MimicError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MimicError::Acquisition {
            source_id: path.display().to_string(),
            details: e.to_string(),
        })?;
        Self::spawn(path.display().to_string(), BufReader::new(file))
    }
}

fn read_lines<R: BufRead>(input: R, tx: SyncSender<LineEvent>) {
    for (lineno, line) in input.lines().enumerate() {
        let event = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match parse_frame(&line) {
                Ok(frame) => LineEvent::Frame(frame),
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "malformed landmark frame; treating as no detection");
                    LineEvent::Frame(PoseFrame::empty())
                }
            },
            Err(e) => LineEvent::Failed(e.to_string()),
        };
        let failed = matches!(event, LineEvent::Failed(_));
        // A send error means the source was closed; stop reading.
        if tx.send(event).is_err() || failed {
            return;
        }
    }
    debug!("landmark input exhausted");
}

impl FrameSource for JsonLinesSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Acquisition, MimicError> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(Acquisition::EndOfStream);
        };
        match rx.recv_timeout(timeout) {
            Ok(LineEvent::Frame(frame)) => Ok(Acquisition::Frame(frame)),
            Ok(LineEvent::Failed(details)) => Err(MimicError::Acquisition {
                source_id: self.id.clone(),
                details,
            }),
            Err(RecvTimeoutError::Timeout) => Err(MimicError::AcquisitionTimeout {
                source_id: self.id.clone(),
                waited_ms: timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Ok(Acquisition::EndOfStream),
        }
    }

    fn close(&mut self) -> Result<(), MimicError> {
        // Dropping the receiver makes the reader's next send fail, which ends
        // the thread. A reader still blocked on input is detached rather than
        // joined; it exits with the process.
        self.rx = None;
        if let Some(reader) = self.reader.take()
            && reader.is_finished()
        {
            let _ = reader.join();
        }
        Ok(())
    }
}

impl Drop for JsonLinesSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
