//! `mimic-control` – the pose-to-servo control law and the loop that runs it.
//!
//! # Modules
//!
//! - [`angle_mapper`] – [`map_arm_angle`][angle_mapper::map_arm_angle]: turns
//!   the vertical offset between a wrist and its shoulder into a raw servo
//!   target in `[0, 180]`.
//! - [`smoothing`] – [`SmoothingFilter`][smoothing::SmoothingFilter]:
//!   per-channel exponential smoothing with a fixed factor of `0.2`.
//! - [`encoder`] – [`encode`][encoder::encode] /
//!   [`decode`][encoder::decode]: the `"<left>,<right>\n"` line protocol.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: owns a
//!   [`FrameSource`][mimic_hal::FrameSource] and a
//!   [`Transport`][mimic_hal::Transport] and runs acquire → map → smooth →
//!   write until stopped, exhausted or failed.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: stderr log
//!   formatter plus optional OTLP span export.

pub mod angle_mapper;
pub mod control_loop;
pub mod encoder;
pub mod smoothing;
pub mod telemetry;

pub use angle_mapper::{arm_target, clamp_to_servo_range, map_arm_angle};
pub use control_loop::{
    ControlLoop, ControlLoopConfig, LoopReport, LoopState, StopReason, TickOutcome,
};
pub use encoder::{decode, encode};
pub use smoothing::{SMOOTHING_FACTOR, SmoothingFilter};
pub use telemetry::{TracerProviderGuard, init_tracing};
