//! Optional visual/diagnostic feedback for commands that reached the link.

use mimic_types::ServoCommand;

/// Receives every command after it has been written to the transport.
///
/// Implementations must not block for long; they run on the control loop.
pub trait FeedbackSink: Send {
    fn show(&mut self, command: &ServoCommand);
}

/// Format a command the way the operator overlay displays it.
pub fn overlay_text(command: &ServoCommand) -> String {
    format!("L:{} R:{}", command.left(), command.right())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_text_lists_left_then_right() {
        let cmd = ServoCommand::new(108, 72).unwrap();
        assert_eq!(overlay_text(&cmd), "L:108 R:72");
    }
}
