use std::io::Write;

use tomatick_core::{Feedback, FeedbackError, HapticKind, SoundId};

/// Rings the terminal bell for sounds. Terminals have no haptics, so those
/// are accepted and dropped.
pub struct TerminalBell;

impl Feedback for TerminalBell {
    fn play(&self, sound: SoundId) -> Result<(), FeedbackError> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|e| FeedbackError::Playback {
                sound: format!("{sound:?}"),
                message: e.to_string(),
            })
    }

    fn haptic(&self, _kind: HapticKind) -> Result<(), FeedbackError> {
        Ok(())
    }
}
