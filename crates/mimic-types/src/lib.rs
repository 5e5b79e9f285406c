use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest angle any servo channel may be commanded to, in degrees.
pub const SERVO_MIN_DEG: f32 = 0.0;
/// Highest angle any servo channel may be commanded to, in degrees.
pub const SERVO_MAX_DEG: f32 = 180.0;
/// [`SERVO_MAX_DEG`] in whole degrees, the bound of the wire protocol.
pub const SERVO_MAX: u8 = 180;
/// Angle every channel holds at process start.
pub const NEUTRAL_DEG: f32 = 90.0;

/// Anatomical points the pose estimator reports that the mimic cares about.
///
/// Names follow the MediaPipe Pose convention; [`LandmarkName::mediapipe_index`]
/// gives the position of each point in the estimator's 33-entry landmark list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandmarkName {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
}

impl LandmarkName {
    pub const ALL: [LandmarkName; 9] = [
        LandmarkName::Nose,
        LandmarkName::LeftShoulder,
        LandmarkName::RightShoulder,
        LandmarkName::LeftElbow,
        LandmarkName::RightElbow,
        LandmarkName::LeftWrist,
        LandmarkName::RightWrist,
        LandmarkName::LeftHip,
        LandmarkName::RightHip,
    ];

    /// Index of this point in a MediaPipe Pose landmark list.
    pub fn mediapipe_index(self) -> usize {
        match self {
            LandmarkName::Nose => 0,
            LandmarkName::LeftShoulder => 11,
            LandmarkName::RightShoulder => 12,
            LandmarkName::LeftElbow => 13,
            LandmarkName::RightElbow => 14,
            LandmarkName::LeftWrist => 15,
            LandmarkName::RightWrist => 16,
            LandmarkName::LeftHip => 23,
            LandmarkName::RightHip => 24,
        }
    }

    /// Wire name, as used by the estimator (`"LEFT_SHOULDER"`, …).
    pub fn as_str(self) -> &'static str {
        match self {
            LandmarkName::Nose => "NOSE",
            LandmarkName::LeftShoulder => "LEFT_SHOULDER",
            LandmarkName::RightShoulder => "RIGHT_SHOULDER",
            LandmarkName::LeftElbow => "LEFT_ELBOW",
            LandmarkName::RightElbow => "RIGHT_ELBOW",
            LandmarkName::LeftWrist => "LEFT_WRIST",
            LandmarkName::RightWrist => "RIGHT_WRIST",
            LandmarkName::LeftHip => "LEFT_HIP",
            LandmarkName::RightHip => "RIGHT_HIP",
        }
    }

    /// Inverse of [`LandmarkName::mediapipe_index`]; `None` for points the
    /// mimic does not track.
    pub fn from_mediapipe_index(index: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.mediapipe_index() == index)
    }
}

impl FromStr for LandmarkName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|n| n.as_str() == s).ok_or(())
    }
}

fn default_visibility() -> f32 {
    1.0
}

/// A single landmark estimate in normalized image coordinates.
///
/// `x` and `y` run from 0 to 1 across the image (y = 0 at the top), `z` is
/// relative depth, and `visibility` is the estimator's confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// Fully visible landmark at `(0.5, y, 0)`. Only `y` matters to the angle mapping.
    pub fn at_height(y: f32) -> Self {
        Self::new(0.5, y, 0.0, 1.0)
    }

    /// `true` when `visibility` meets `threshold`. A threshold of zero or
    /// below disables the gate, even for a NaN visibility.
    pub fn passes_visibility(&self, threshold: f32) -> bool {
        threshold <= 0.0 || self.visibility >= threshold
    }
}

/// Named landmark lookup for one detected body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    landmarks: BTreeMap<LandmarkName, Landmark>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: LandmarkName, landmark: Landmark) -> Self {
        self.insert(name, landmark);
        self
    }

    pub fn insert(&mut self, name: LandmarkName, landmark: Landmark) {
        self.landmarks.insert(name, landmark);
    }

    pub fn landmark(&self, name: LandmarkName) -> Option<&Landmark> {
        self.landmarks.get(&name)
    }

    /// Build a pose from an estimator's indexed landmark list, keeping only the
    /// tracked points. Entries past the end of `indexed` are simply absent.
    pub fn from_indexed(indexed: &[Landmark]) -> Self {
        let landmarks = indexed
            .iter()
            .enumerate()
            .filter_map(|(i, lm)| LandmarkName::from_mediapipe_index(i).map(|n| (n, *lm)))
            .collect();
        Self { landmarks }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// One capture instant as seen by the control loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseFrame {
    pose: Option<Pose>,
}

impl PoseFrame {
    /// A frame in which the estimator found a body.
    pub fn detected(pose: Pose) -> Self {
        Self { pose: Some(pose) }
    }

    /// A frame in which no body was found.
    pub fn empty() -> Self {
        Self { pose: None }
    }

    pub fn pose(&self) -> Option<&Pose> {
        self.pose.as_ref()
    }
}

/// One independently smoothed and actuated servo joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    /// Dense index, suitable for per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }

    pub fn shoulder(self) -> LandmarkName {
        match self {
            Channel::Left => LandmarkName::LeftShoulder,
            Channel::Right => LandmarkName::RightShoulder,
        }
    }

    pub fn wrist(self) -> LandmarkName {
        match self {
            Channel::Left => LandmarkName::LeftWrist,
            Channel::Right => LandmarkName::RightWrist,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Left => write!(f, "left"),
            Channel::Right => write!(f, "right"),
        }
    }
}

/// Integer angle pair bound for the actuator controller.
///
/// Both angles are guaranteed to lie in `[0, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServoCommand {
    left: u8,
    right: u8,
}

impl ServoCommand {
    /// # Errors
    ///
    /// Returns [`MimicError::InvalidCommand`] if either angle exceeds 180.
    pub fn new(left: u8, right: u8) -> Result<Self, MimicError> {
        for (channel, angle) in [(Channel::Left, left), (Channel::Right, right)] {
            if angle > SERVO_MAX {
                return Err(MimicError::InvalidCommand(format!(
                    "{channel} angle {angle} outside [0, 180]"
                )));
            }
        }
        Ok(Self { left, right })
    }

    /// Convert smoothed angles to whole degrees by truncation toward zero.
    ///
    /// Inputs outside `[0, 180]` saturate at the nearest bound.
    pub fn from_angles(left: f32, right: f32) -> Self {
        Self {
            left: truncate_deg(left),
            right: truncate_deg(right),
        }
    }

    pub fn left(&self) -> u8 {
        self.left
    }

    pub fn right(&self) -> u8 {
        self.right
    }

    pub fn angle(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }
}

fn truncate_deg(angle: f32) -> u8 {
    // `as` truncates toward zero and maps NaN to 0.
    angle.clamp(SERVO_MIN_DEG, SERVO_MAX_DEG) as u8
}

/// Pipeline stage a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Acquisition,
    Transport,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup => write!(f, "setup"),
            Stage::Acquisition => write!(f, "acquisition"),
            Stage::Transport => write!(f, "transport"),
        }
    }
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum MimicError {
    #[error("Acquisition Failure on {source_id}: {details}")]
    Acquisition { source_id: String, details: String },

    #[error("Acquisition Timeout on {source_id}: no frame within {waited_ms} ms")]
    AcquisitionTimeout { source_id: String, waited_ms: u64 },

    #[error("Transport Open Failure on {transport}: {details}")]
    TransportOpen { transport: String, details: String },

    #[error("Transport Write Failure on {transport}: {details}")]
    TransportWrite { transport: String, details: String },

    #[error("Transport Timeout on {transport}: write not accepted within {waited_ms} ms")]
    TransportTimeout { transport: String, waited_ms: u64 },

    #[error("Invalid Command: {0}")]
    InvalidCommand(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl MimicError {
    /// Which stage of the pipeline raised this error.
    pub fn stage(&self) -> Stage {
        match self {
            MimicError::Acquisition { .. } | MimicError::AcquisitionTimeout { .. } => {
                Stage::Acquisition
            }
            MimicError::TransportOpen { .. }
            | MimicError::TransportWrite { .. }
            | MimicError::TransportTimeout { .. } => Stage::Transport,
            MimicError::InvalidCommand(_) | MimicError::Config(_) => Stage::Setup,
        }
    }
}
