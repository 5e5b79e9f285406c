//! Line protocol spoken to the servo microcontroller.
//!
//! One command per line, two base-10 angles separated by a comma:
//!
//! ```text
//! <left>,<right>\n
//! ```
//!
//! There is no checksum or framing beyond the newline; the firmware splits on
//! the comma and trims the line ending.

use mimic_types::{MimicError, ServoCommand};

/// Encode `command` as a single newline-terminated ASCII line.
pub fn encode(command: &ServoCommand) -> Vec<u8> {
    format!("{},{}\n", command.left(), command.right()).into_bytes()
}

/// Parse one protocol line back into a command. A trailing `\n` or `\r\n` is
/// optional.
///
/// # Errors
///
/// Returns [`MimicError::InvalidCommand`] when the line is not two integers
/// in `[0, 180]` separated by a comma.
pub fn decode(line: &[u8]) -> Result<ServoCommand, MimicError> {
    let text = std::str::from_utf8(line)
        .map_err(|e| MimicError::InvalidCommand(format!("line is not ASCII: {e}")))?;
    let text = text.trim_end_matches(['\r', '\n']);
    let (left, right) = text
        .split_once(',')
        .ok_or_else(|| MimicError::InvalidCommand(format!("missing comma in {text:?}")))?;
    ServoCommand::new(parse_angle(left)?, parse_angle(right)?)
}

fn parse_angle(field: &str) -> Result<u8, MimicError> {
    field
        .parse::<u8>()
        .map_err(|e| MimicError::InvalidCommand(format!("bad angle {field:?}: {e}")))
}
