//! Generic `Transport` trait for the outbound link to the actuator controller.
//!
//! The link is a plain byte sink: the control loop hands it one encoded
//! command per tick and waits for the write to complete before fetching the
//! next frame.

use mimic_types::MimicError;

/// A blocking, exclusively owned byte sink (serial port, socket, pipe, …).
pub trait Transport: Send {
    /// Stable identifier used in diagnostics, e.g. `"/dev/ttyUSB0"`.
    fn id(&self) -> &str;

    /// Write `bytes` in full, blocking until the link accepts them.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::TransportTimeout`] if the link does not accept
    /// the bytes within its configured write timeout, and
    /// [`MimicError::TransportWrite`] for any other failure.
    fn write(&mut self, bytes: &[u8]) -> Result<(), MimicError>;

    /// Release the link. Writes after `close` fail with
    /// [`MimicError::TransportWrite`].
    fn close(&mut self) -> Result<(), MimicError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockTransport {
        id: String,
        sent: Vec<u8>,
        open: bool,
    }

    impl Transport for MockTransport {
        fn id(&self) -> &str {
            &self.id
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), MimicError> {
            if !self.open {
                return Err(MimicError::TransportWrite {
                    transport: self.id.clone(),
                    details: "closed".to_string(),
                });
            }
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn close(&mut self) -> Result<(), MimicError> {
            self.open = false;
            Ok(())
        }
    }

    #[test]
    fn mock_transport_write_then_close() {
        let mut link = MockTransport {
            id: "loopback".to_string(),
            sent: Vec::new(),
            open: true,
        };
        link.write(b"90,90\n").unwrap();
        assert_eq!(link.sent, b"90,90\n");

        link.close().unwrap();
        let err = link.write(b"91,90\n").unwrap_err();
        assert!(matches!(err, MimicError::TransportWrite { .. }));
        assert_eq!(link.sent.len(), 6);
    }
}
