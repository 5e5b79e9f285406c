//! Live command overlay for the operator's terminal.

use colored::Colorize;
use std::io::Write;

use mimic_hal::FeedbackSink;
use mimic_hal::feedback::overlay_text;
use mimic_types::ServoCommand;

/// Rewrites a single status line with the last command sent.
pub struct ConsoleFeedback<W: Write + Send> {
    out: W,
}

impl ConsoleFeedback<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleFeedback<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> FeedbackSink for ConsoleFeedback<W> {
    fn show(&mut self, command: &ServoCommand) {
        // Overlay output is best effort; a closed stdout must not stop the servos.
        let _ = write!(self.out, "\r  {}   ", overlay_text(command).bold().green());
        let _ = self.out.flush();
    }
}
