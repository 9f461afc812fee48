//! Audio/haptic feedback collaborator.
//!
//! The engine never waits on feedback and never fails because of it: the
//! [`FeedbackDispatcher`] applies the user's sound settings, forwards to the
//! platform implementation and logs whatever error comes back.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FeedbackError;
use crate::events::Event;
use crate::storage::{Settings, SoundMode, Toggle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundId {
    ButtonPress,
    PhaseComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticKind {
    Selection,
    Notification,
}

/// Platform audio/haptics. Implementations may fail; callers swallow it.
pub trait Feedback: Send + Sync {
    fn play(&self, sound: SoundId) -> Result<(), FeedbackError>;

    fn haptic(&self, kind: HapticKind) -> Result<(), FeedbackError>;

    /// Start or pause ambient music.
    fn set_ambient(&self, _playing: bool) -> Result<(), FeedbackError> {
        Ok(())
    }
}

/// Feedback sink that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl Feedback for SilentFeedback {
    fn play(&self, _sound: SoundId) -> Result<(), FeedbackError> {
        Ok(())
    }

    fn haptic(&self, _kind: HapticKind) -> Result<(), FeedbackError> {
        Ok(())
    }
}

/// Why feedback is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Pause or resume pressed.
    PauseToggled { running: bool },
    /// Step changed by the user (skip or jump).
    StepChanged,
    /// A phase ran to zero.
    PhaseCompleted,
}

impl Cue {
    /// Cue implied by an engine event, if any.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::PhaseStarted { .. } | Event::PhaseResumed { .. } => {
                Some(Cue::PauseToggled { running: true })
            }
            Event::PhasePaused { .. } => Some(Cue::PauseToggled { running: false }),
            Event::PhaseSkipped { .. } => Some(Cue::StepChanged),
            Event::PhaseCompleted { .. } => Some(Cue::PhaseCompleted),
            _ => None,
        }
    }
}

pub struct FeedbackDispatcher {
    sink: Box<dyn Feedback>,
}

impl FeedbackDispatcher {
    pub fn new(sink: Box<dyn Feedback>) -> Self {
        Self { sink }
    }

    pub fn cue(&self, cue: Cue, settings: &Settings) {
        match (cue, settings.sound) {
            (_, SoundMode::Off) => {}
            (Cue::PauseToggled { .. } | Cue::StepChanged, SoundMode::System) => {
                self.haptic(HapticKind::Selection)
            }
            (Cue::PhaseCompleted, SoundMode::System) => self.haptic(HapticKind::Notification),
            (Cue::StepChanged, SoundMode::On) => self.play(SoundId::ButtonPress),
            (Cue::PhaseCompleted, SoundMode::On) => self.play(SoundId::PhaseComplete),
            (Cue::PauseToggled { .. }, SoundMode::On) => {}
        }

        match (cue, settings.lofi) {
            (Cue::PauseToggled { running }, Toggle::On) => self.ambient(running),
            (Cue::PhaseCompleted, Toggle::On) => self.ambient(false),
            _ => {}
        }
    }

    /// Stop ambient playback regardless of cue, e.g. when lofi is switched off.
    pub fn stop_ambient(&self) {
        self.ambient(false);
    }

    fn play(&self, sound: SoundId) {
        if let Err(e) = self.sink.play(sound) {
            warn!(?sound, error = %e, "sound playback failed");
        }
    }

    fn haptic(&self, kind: HapticKind) {
        if let Err(e) = self.sink.haptic(kind) {
            warn!(?kind, error = %e, "haptic feedback failed");
        }
    }

    fn ambient(&self, playing: bool) {
        if let Err(e) = self.sink.set_ambient(playing) {
            warn!(playing, error = %e, "ambient playback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recording {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Feedback for Recording {
        fn play(&self, sound: SoundId) -> Result<(), FeedbackError> {
            self.calls.lock().unwrap().push(format!("play:{sound:?}"));
            if self.fail {
                return Err(FeedbackError::Playback {
                    sound: format!("{sound:?}"),
                    message: "device busy".into(),
                });
            }
            Ok(())
        }

        fn haptic(&self, kind: HapticKind) -> Result<(), FeedbackError> {
            self.calls.lock().unwrap().push(format!("haptic:{kind:?}"));
            if self.fail {
                return Err(FeedbackError::HapticsUnavailable("no motor".into()));
            }
            Ok(())
        }

        fn set_ambient(&self, playing: bool) -> Result<(), FeedbackError> {
            self.calls.lock().unwrap().push(format!("ambient:{playing}"));
            Ok(())
        }
    }

    fn settings(sound: SoundMode, lofi: Toggle) -> Settings {
        Settings {
            sound,
            lofi,
            ..Settings::default()
        }
    }

    #[test]
    fn system_sound_uses_haptics() {
        let rec = Recording::default();
        let dispatcher = FeedbackDispatcher::new(Box::new(rec.clone()));
        let s = settings(SoundMode::System, Toggle::Off);
        dispatcher.cue(Cue::StepChanged, &s);
        dispatcher.cue(Cue::PhaseCompleted, &s);
        assert_eq!(
            *rec.calls.lock().unwrap(),
            vec!["haptic:Selection", "haptic:Notification"]
        );
    }

    #[test]
    fn sound_on_plays_button_press_on_step_change() {
        let rec = Recording::default();
        let dispatcher = FeedbackDispatcher::new(Box::new(rec.clone()));
        let s = settings(SoundMode::On, Toggle::Off);
        dispatcher.cue(Cue::PauseToggled { running: true }, &s);
        dispatcher.cue(Cue::StepChanged, &s);
        assert_eq!(*rec.calls.lock().unwrap(), vec!["play:ButtonPress"]);
    }

    #[test]
    fn sound_off_is_silent_but_lofi_follows_pause() {
        let rec = Recording::default();
        let dispatcher = FeedbackDispatcher::new(Box::new(rec.clone()));
        let s = settings(SoundMode::Off, Toggle::On);
        dispatcher.cue(Cue::PauseToggled { running: true }, &s);
        dispatcher.cue(Cue::PauseToggled { running: false }, &s);
        assert_eq!(
            *rec.calls.lock().unwrap(),
            vec!["ambient:true", "ambient:false"]
        );
    }

    #[test]
    fn failures_are_swallowed() {
        let rec = Recording {
            fail: true,
            ..Recording::default()
        };
        let dispatcher = FeedbackDispatcher::new(Box::new(rec.clone()));
        dispatcher.cue(Cue::PhaseCompleted, &settings(SoundMode::On, Toggle::Off));
        dispatcher.cue(Cue::StepChanged, &settings(SoundMode::System, Toggle::Off));
        assert_eq!(rec.calls.lock().unwrap().len(), 2);
    }
}
