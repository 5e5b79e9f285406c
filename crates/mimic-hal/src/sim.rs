//! In-process simulation doubles for running the control loop without a
//! camera or a microcontroller attached.
//!
//! [`ScriptedSource`] replays a fixed list of frames and [`RecordingTransport`]
//! keeps every line the loop writes. Both hand out cheap probe handles so a
//! test can keep observing them after the loop has taken ownership.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mimic_hal::sim::{RecordingTransport, ScriptedSource};
//! use mimic_hal::{Acquisition, FrameSource, Transport};
//!
//! let mut source = ScriptedSource::new("sim-cam").with_empty_frame();
//! let mut link = RecordingTransport::new("sim-link");
//! let probe = link.probe();
//!
//! assert!(matches!(source.next_frame(Duration::ZERO), Ok(Acquisition::Frame(_))));
//! assert!(matches!(source.next_frame(Duration::ZERO), Ok(Acquisition::EndOfStream)));
//!
//! link.write(b"90,90\n").expect("sim write must succeed");
//! assert_eq!(probe.lines(), vec!["90,90".to_string()]);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mimic_types::{MimicError, Pose, PoseFrame};

use crate::frame_source::{Acquisition, FrameSource};
use crate::transport::Transport;

// ────────────────────────────────────────────────────────────────────────────
// Scripted frame source
// ────────────────────────────────────────────────────────────────────────────

enum Step {
    Frame(PoseFrame),
    Fail(String),
    Stall,
}

/// Observes a [`ScriptedSource`] after it has been moved into the loop.
#[derive(Clone, Default)]
pub struct SourceProbe {
    served: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl SourceProbe {
    /// Number of frames handed out so far.
    pub fn frames_served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// A [`FrameSource`] that replays a scripted sequence, then reports
/// end-of-stream.
pub struct ScriptedSource {
    id: String,
    steps: VecDeque<Step>,
    closed: bool,
    probe: SourceProbe,
}

impl ScriptedSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: VecDeque::new(),
            closed: false,
            probe: SourceProbe::default(),
        }
    }

    /// Queue a frame with a detected body.
    pub fn with_pose(self, pose: Pose) -> Self {
        self.with_frame(PoseFrame::detected(pose))
    }

    /// Queue a frame in which no body was detected.
    pub fn with_empty_frame(self) -> Self {
        self.with_frame(PoseFrame::empty())
    }

    pub fn with_frame(mut self, frame: PoseFrame) -> Self {
        self.steps.push_back(Step::Frame(frame));
        self
    }

    /// Queue a device failure.
    pub fn with_failure(mut self, details: impl Into<String>) -> Self {
        self.steps.push_back(Step::Fail(details.into()));
        self
    }

    /// Queue an acquisition that never completes within its timeout.
    pub fn with_stall(mut self) -> Self {
        self.steps.push_back(Step::Stall);
        self
    }

    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Acquisition, MimicError> {
        if self.closed {
            return Err(MimicError::Acquisition {
                source_id: self.id.clone(),
                details: "source already closed".to_string(),
            });
        }
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => {
                self.probe.served.fetch_add(1, Ordering::SeqCst);
                Ok(Acquisition::Frame(frame))
            }
            Some(Step::Fail(details)) => Err(MimicError::Acquisition {
                source_id: self.id.clone(),
                details,
            }),
            Some(Step::Stall) => Err(MimicError::AcquisitionTimeout {
                source_id: self.id.clone(),
                waited_ms: timeout.as_millis() as u64,
            }),
            None => Ok(Acquisition::EndOfStream),
        }
    }

    fn close(&mut self) -> Result<(), MimicError> {
        self.closed = true;
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording transport
// ────────────────────────────────────────────────────────────────────────────

/// Observes a [`RecordingTransport`] after it has been moved into the loop.
#[derive(Clone, Default)]
pub struct TransportProbe {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    closes: Arc<AtomicUsize>,
}

impl TransportProbe {
    /// Raw payload of every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Every successful write as text with the trailing newline removed.
    pub fn lines(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end_matches('\n').to_string())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

enum WriteFault {
    Error,
    Timeout,
}

/// A [`Transport`] that records every write. Optionally starts failing after
/// a given number of successful writes.
pub struct RecordingTransport {
    id: String,
    fail_after: Option<(usize, WriteFault)>,
    closed: bool,
    probe: TransportProbe,
}

impl RecordingTransport {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fail_after: None,
            closed: false,
            probe: TransportProbe::default(),
        }
    }

    /// Accept `ok_writes` writes, then fail every subsequent one.
    pub fn failing_after(mut self, ok_writes: usize) -> Self {
        self.fail_after = Some((ok_writes, WriteFault::Error));
        self
    }

    /// Accept `ok_writes` writes, then time out on every subsequent one.
    pub fn stalling_after(mut self, ok_writes: usize) -> Self {
        self.fail_after = Some((ok_writes, WriteFault::Timeout));
        self
    }

    pub fn probe(&self) -> TransportProbe {
        self.probe.clone()
    }
}

impl Transport for RecordingTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), MimicError> {
        if self.closed {
            return Err(MimicError::TransportWrite {
                transport: self.id.clone(),
                details: "link already closed".to_string(),
            });
        }
        let mut written = self.probe.written.lock().map_err(|_| MimicError::TransportWrite {
            transport: self.id.clone(),
            details: "recording buffer poisoned".to_string(),
        })?;
        match &self.fail_after {
            Some((limit, WriteFault::Error)) if written.len() >= *limit => {
                Err(MimicError::TransportWrite {
                    transport: self.id.clone(),
                    details: "simulated link failure".to_string(),
                })
            }
            Some((limit, WriteFault::Timeout)) if written.len() >= *limit => {
                Err(MimicError::TransportTimeout {
                    transport: self.id.clone(),
                    waited_ms: 0,
                })
            }
            _ => {
                written.push(bytes.to_vec());
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<(), MimicError> {
        self.closed = true;
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_types::{Landmark, LandmarkName};

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[test]
    fn scripted_source_replays_in_order() {
        let pose = Pose::new().with(LandmarkName::LeftWrist, Landmark::at_height(0.2));
        let mut src = ScriptedSource::new("sim").with_empty_frame().with_pose(pose.clone());
        let probe = src.probe();

        assert_eq!(
            src.next_frame(NO_WAIT).unwrap(),
            Acquisition::Frame(PoseFrame::empty())
        );
        assert_eq!(
            src.next_frame(NO_WAIT).unwrap(),
            Acquisition::Frame(PoseFrame::detected(pose))
        );
        assert_eq!(src.next_frame(NO_WAIT).unwrap(), Acquisition::EndOfStream);
        assert_eq!(probe.frames_served(), 2);
    }

    #[test]
    fn scripted_failure_and_stall() {
        let mut src = ScriptedSource::new("sim").with_failure("lens cap on").with_stall();
        let err = src.next_frame(NO_WAIT).unwrap_err();
        assert!(err.to_string().contains("lens cap on"));
        let err = src.next_frame(Duration::from_millis(250)).unwrap_err();
        assert!(matches!(err, MimicError::AcquisitionTimeout { waited_ms: 250, .. }));
    }

    #[test]
    fn scripted_source_refuses_after_close() {
        let mut src = ScriptedSource::new("sim").with_empty_frame();
        let probe = src.probe();
        src.close().unwrap();
        assert!(src.next_frame(NO_WAIT).is_err());
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn recording_transport_keeps_lines() {
        let mut link = RecordingTransport::new("sim-link");
        let probe = link.probe();
        link.write(b"45,120\n").unwrap();
        link.write(b"46,119\n").unwrap();
        assert_eq!(probe.lines(), vec!["45,120", "46,119"]);
        assert_eq!(probe.writes()[0], b"45,120\n".to_vec());
    }

    #[test]
    fn recording_transport_fails_after_limit() {
        let mut link = RecordingTransport::new("sim-link").failing_after(1);
        let probe = link.probe();
        link.write(b"1,1\n").unwrap();
        let err = link.write(b"2,2\n").unwrap_err();
        assert!(matches!(err, MimicError::TransportWrite { .. }));
        assert_eq!(probe.lines(), vec!["1,1"]);
    }

    #[test]
    fn recording_transport_stalls_after_limit() {
        let mut link = RecordingTransport::new("sim-link").stalling_after(0);
        let err = link.write(b"1,1\n").unwrap_err();
        assert!(matches!(err, MimicError::TransportTimeout { .. }));
    }

    #[test]
    fn recording_transport_rejects_writes_after_close() {
        let mut link = RecordingTransport::new("sim-link");
        let probe = link.probe();
        link.close().unwrap();
        assert!(link.write(b"1,1\n").is_err());
        assert!(probe.writes().is_empty());
        assert_eq!(probe.close_count(), 1);
    }
}
