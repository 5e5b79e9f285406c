//! Generic `FrameSource` trait for anything that produces pose estimates.

use std::time::Duration;

use mimic_types::{MimicError, PoseFrame};

/// Result of a single acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    /// A frame was captured. It may or may not contain a detected body.
    Frame(PoseFrame),
    /// The source is exhausted; no further frames will ever arrive.
    EndOfStream,
}

/// A camera + pose-estimator pipeline, seen as a stream of [`PoseFrame`]s.
pub trait FrameSource: Send {
    /// Stable identifier used in diagnostics, e.g. `"stdin"` or a file path.
    fn id(&self) -> &str;

    /// Block until the next frame is available, the stream ends, or `timeout`
    /// elapses.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::AcquisitionTimeout`] when no frame arrives within
    /// `timeout`, and [`MimicError::Acquisition`] when the underlying device
    /// fails.
    fn next_frame(&mut self, timeout: Duration) -> Result<Acquisition, MimicError>;

    /// Release any resources held by the source. Called once when the loop
    /// exits; further `next_frame` calls after `close` report end-of-stream
    /// or an error.
    fn close(&mut self) -> Result<(), MimicError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_types::{Landmark, LandmarkName, Pose};

    struct MockSource {
        id: String,
        remaining: usize,
    }

    impl FrameSource for MockSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn next_frame(&mut self, _timeout: Duration) -> Result<Acquisition, MimicError> {
            if self.remaining == 0 {
                return Ok(Acquisition::EndOfStream);
            }
            self.remaining -= 1;
            let pose = Pose::new().with(LandmarkName::Nose, Landmark::at_height(0.1));
            Ok(Acquisition::Frame(PoseFrame::detected(pose)))
        }
    }

    #[test]
    fn mock_source_yields_then_ends() {
        let mut src = MockSource {
            id: "webcam0".to_string(),
            remaining: 1,
        };
        assert_eq!(src.id(), "webcam0");
        let first = src.next_frame(Duration::from_millis(10)).unwrap();
        assert!(matches!(first, Acquisition::Frame(ref f) if f.pose().is_some()));
        assert_eq!(
            src.next_frame(Duration::from_millis(10)).unwrap(),
            Acquisition::EndOfStream
        );
        assert!(src.close().is_ok());
    }
}
