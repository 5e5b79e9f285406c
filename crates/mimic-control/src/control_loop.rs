//! [`ControlLoop`] – pose frames in, servo lines out.
//!
//! Each tick:
//!
//! 1. **Acquire** – wait (bounded by
//!    [`ControlLoopConfig::acquire_timeout`]) for the next [`PoseFrame`].
//! 2. **Map** – turn the shoulder/wrist pair of each arm into a raw target
//!    with [`arm_target`].
//! 3. **Smooth** – blend both targets into the running channel angles
//!    ([`SmoothingFilter`]).
//! 4. **Encode & write** – truncate to whole degrees, encode one protocol
//!    line and write it synchronously to the [`Transport`].
//!
//! A frame without a usable body skips steps 2–4 and leaves the channel
//! angles untouched. The loop is paced purely by frame acquisition: every
//! write completes before the next frame is requested, so commands can never
//! queue up behind a slow link.
//!
//! # Termination
//!
//! [`ControlLoop::run`] returns when the stop flag is observed (checked only
//! between ticks, never mid-write), when the source reports end-of-stream, or
//! on the first acquisition or transport failure. An acquisition failure that
//! ends a wait during which the stop flag was raised counts as a stop. In
//! every case the transport and the frame source are closed exactly once
//! before `run` returns.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::AtomicBool;
//! use mimic_control::control_loop::{ControlLoop, ControlLoopConfig, StopReason};
//! use mimic_hal::sim::{RecordingTransport, ScriptedSource};
//!
//! let source = ScriptedSource::new("sim-cam").with_empty_frame();
//! let link = RecordingTransport::new("sim-link");
//! let probe = link.probe();
//!
//! let mut control = ControlLoop::new(Box::new(source), Box::new(link), ControlLoopConfig::default())
//!     .expect("default config is valid");
//! let reason = control.run(&AtomicBool::new(false)).expect("loop must finish cleanly");
//!
//! assert_eq!(reason, StopReason::EndOfStream);
//! assert!(probe.writes().is_empty());
//! assert_eq!(probe.close_count(), 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mimic_hal::{Acquisition, FeedbackSink, FrameSource, Transport};
use mimic_types::{Channel, MimicError, Pose, PoseFrame, ServoCommand, Stage};
use tracing::{debug, error, info, instrument, warn};

use crate::angle_mapper::arm_target;
use crate::encoder::encode;
use crate::smoothing::SmoothingFilter;

/// Default upper bound on waiting for a single frame.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime knobs of the loop. The control law itself has no knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopConfig {
    /// Longest wait for one frame before the loop gives up.
    pub acquire_timeout: Duration,
    /// Frames whose shoulder or wrist visibility falls below this value are
    /// treated as having no detection. `0.0` accepts every landmark.
    pub min_visibility: f32,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            min_visibility: 0.0,
        }
    }
}

impl ControlLoopConfig {
    /// # Errors
    ///
    /// Returns [`MimicError::Config`] for a zero timeout or a visibility
    /// threshold outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), MimicError> {
        if self.acquire_timeout.is_zero() {
            return Err(MimicError::Config(
                "acquire_timeout must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(MimicError::Config(format!(
                "min_visibility {} outside [0, 1]",
                self.min_visibility
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Phase of the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting on the frame source. Also the state between ticks.
    AwaitingFrame,
    /// Mapping, smoothing and writing the frame just acquired.
    Processing,
}

/// What a single [`ControlLoop::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A body was detected and this command was written to the link.
    Sent(ServoCommand),
    /// The frame carried no usable body; nothing was written.
    NoDetection,
    /// The frame source is exhausted.
    EndOfStream,
}

/// Why [`ControlLoop::run`] returned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The external stop flag was raised.
    Stopped,
    /// The frame source ran out of frames.
    EndOfStream,
}

/// Running counters, logged when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    /// Frames acquired.
    pub ticks: u64,
    /// Frames with a usable body.
    pub detections: u64,
    /// Frames skipped for lack of a usable body.
    pub skipped: u64,
    /// Commands the link accepted.
    pub writes: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the frame source, the link and the per-channel angles for the whole
/// session.
pub struct ControlLoop {
    source: Box<dyn FrameSource>,
    transport: Box<dyn Transport>,
    feedback: Option<Box<dyn FeedbackSink>>,
    filter: SmoothingFilter,
    config: ControlLoopConfig,
    state: LoopState,
    report: LoopReport,
    closed: bool,
}

impl ControlLoop {
    /// Take ownership of an already opened source and link.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::Config`] if `config` fails validation.
    pub fn new(
        source: Box<dyn FrameSource>,
        transport: Box<dyn Transport>,
        config: ControlLoopConfig,
    ) -> Result<Self, MimicError> {
        config.validate()?;
        Ok(Self {
            source,
            transport,
            feedback: None,
            filter: SmoothingFilter::default(),
            config,
            state: LoopState::AwaitingFrame,
            report: LoopReport::default(),
            closed: false,
        })
    }

    /// Attach a sink that sees every command after it has been written.
    pub fn with_feedback(mut self, sink: Box<dyn FeedbackSink>) -> Self {
        self.feedback = Some(sink);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Last smoothed angle of `channel`, in degrees.
    pub fn channel_angle(&self, channel: Channel) -> f32 {
        self.filter.angle(channel)
    }

    pub fn report(&self) -> LoopReport {
        self.report
    }

    /// `true` once the source and the link have been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run one acquire → map → smooth → write cycle.
    ///
    /// # Errors
    ///
    /// Propagates acquisition and transport failures unchanged. After a
    /// transport failure the channel angles still hold the values computed
    /// for the failed command. Calling `tick` after [`shutdown`][Self::shutdown]
    /// fails with [`MimicError::Acquisition`].
    #[instrument(level = "trace", skip_all)]
    pub fn tick(&mut self) -> Result<TickOutcome, MimicError> {
        if self.closed {
            return Err(MimicError::Acquisition {
                source_id: self.source.id().to_string(),
                details: "control loop already shut down".to_string(),
            });
        }

        self.state = LoopState::AwaitingFrame;
        let frame = match self.source.next_frame(self.config.acquire_timeout)? {
            Acquisition::Frame(frame) => frame,
            Acquisition::EndOfStream => return Ok(TickOutcome::EndOfStream),
        };
        self.report.ticks += 1;

        self.state = LoopState::Processing;
        let outcome = self.process(&frame);
        self.state = LoopState::AwaitingFrame;
        outcome
    }

    fn process(&mut self, frame: &PoseFrame) -> Result<TickOutcome, MimicError> {
        let Some([left_target, right_target]) = frame.pose().and_then(|p| self.targets(p)) else {
            self.report.skipped += 1;
            debug!(frame = self.report.ticks, "no usable pose; holding position");
            return Ok(TickOutcome::NoDetection);
        };
        self.report.detections += 1;

        let left = self.filter.smooth(Channel::Left, left_target);
        let right = self.filter.smooth(Channel::Right, right_target);
        let command = ServoCommand::from_angles(left, right);

        self.transport.write(&encode(&command))?;
        self.report.writes += 1;
        debug!(left = command.left(), right = command.right(), "command sent");

        if let Some(sink) = self.feedback.as_mut() {
            sink.show(&command);
        }
        Ok(TickOutcome::Sent(command))
    }

    fn targets(&self, pose: &Pose) -> Option<[f32; 2]> {
        let left = arm_target(pose, Channel::Left, self.config.min_visibility)?;
        let right = arm_target(pose, Channel::Right, self.config.min_visibility)?;
        Some([left, right])
    }

    /// Tick until `stop` is raised, the source ends, or a stage fails; then
    /// release the source and the link.
    ///
    /// # Errors
    ///
    /// Returns the first acquisition or transport failure. If the loop itself
    /// ended cleanly but releasing a resource failed, that error is returned
    /// instead.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<StopReason, MimicError> {
        info!(
            source = self.source.id(),
            transport = self.transport.id(),
            "control loop started"
        );

        let outcome = loop {
            if stop.load(Ordering::SeqCst) {
                info!("stop requested");
                break Ok(StopReason::Stopped);
            }
            match self.tick() {
                Ok(TickOutcome::EndOfStream) => {
                    info!("frame source exhausted");
                    break Ok(StopReason::EndOfStream);
                }
                Ok(_) => {}
                Err(e) if e.stage() == Stage::Acquisition && stop.load(Ordering::SeqCst) => {
                    info!(error = %e, "stop requested while waiting for a frame");
                    break Ok(StopReason::Stopped);
                }
                Err(e) => {
                    error!(stage = %e.stage(), error = %e, "control loop failed");
                    break Err(e);
                }
            }
        };

        let released = self.shutdown();
        let report = self.report;
        info!(
            ticks = report.ticks,
            detections = report.detections,
            skipped = report.skipped,
            writes = report.writes,
            "control loop finished"
        );
        outcome.and_then(|reason| released.map(|()| reason))
    }

    /// Close the link and the frame source. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first close failure; both resources are still released.
    pub fn shutdown(&mut self) -> Result<(), MimicError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.state = LoopState::AwaitingFrame;
        let transport = self.transport.close();
        let source = self.source.close();
        transport.and(source)
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "failed to release resources on drop");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
