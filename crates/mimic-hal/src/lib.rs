//! `mimic-hal` – hardware collaborators of the control loop.
//!
//! The control loop only ever talks to the traits defined here, so the
//! camera/estimator pipeline and the servo link can be swapped (or simulated)
//! without touching the control law.
//!
//! # Modules
//!
//! - [`frame_source`] – [`FrameSource`][frame_source::FrameSource]: yields one
//!   [`PoseFrame`][mimic_types::PoseFrame] per tick, or end-of-stream.
//! - [`transport`] – [`Transport`][transport::Transport]: blocking byte sink
//!   towards the actuator controller.
//! - [`feedback`] – [`FeedbackSink`][feedback::FeedbackSink]: optional
//!   receiver of every command actually sent (on-screen overlay, logs).
//! - [`json_lines`] – [`JsonLinesSource`][json_lines::JsonLinesSource]: reads
//!   newline-delimited JSON landmark frames from an out-of-process estimator.
//! - [`serial`] – [`SerialTransport`][serial::SerialTransport]: UART link to
//!   the microcontroller via the `serialport` crate.
//! - [`sim`] – scripted sources and recording transports for headless tests.

pub mod feedback;
pub mod frame_source;
pub mod json_lines;
pub mod serial;
pub mod sim;
pub mod transport;

pub use feedback::FeedbackSink;
pub use frame_source::{Acquisition, FrameSource};
pub use json_lines::JsonLinesSource;
pub use serial::{SerialSettings, SerialTransport};
pub use transport::Transport;
