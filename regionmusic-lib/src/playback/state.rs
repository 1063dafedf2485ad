use std::mem;

use crate::audio::PlaybackLine;

use super::fade::CancelToken;

/// One opened track: its line and the ramp currently driving it.
pub struct PlaybackSession {
    id: u64,
    filename: String,
    line: Box<dyn PlaybackLine>,
    fade: Option<CancelToken>,
}

impl PlaybackSession {
    pub(crate) fn new(id: u64, filename: impl Into<String>, line: Box<dyn PlaybackLine>) -> Self {
        Self {
            id,
            filename: filename.into(),
            line,
            fade: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub(crate) fn line(&self) -> &dyn PlaybackLine {
        self.line.as_ref()
    }

    pub(crate) fn line_mut(&mut self) -> &mut dyn PlaybackLine {
        self.line.as_mut()
    }

    /// Replace the ramp token, cancelling the previous ramp.
    pub(crate) fn set_fade(&mut self, token: Option<CancelToken>) {
        self.cancel_fade();
        self.fade = token;
    }

    pub(crate) fn cancel_fade(&mut self) {
        if let Some(token) = self.fade.take() {
            token.cancel();
        }
    }

    /// Cancel any ramp and close the line.
    pub(crate) fn release(mut self) {
        self.cancel_fade();
        self.line.close();
        log::debug!("released session {} ({})", self.id, self.filename);
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("fading", &self.fade.is_some())
            .finish()
    }
}

/// Coarse playback state reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Nothing current; a previous track may still be fading out.
    Idle,
    Playing,
    /// A current track plus a previous one fading out.
    Transitioning,
}

/// Which sessions exist. Every transition replaces the whole value.
#[derive(Debug)]
pub(crate) enum PlaybackState {
    Idle {
        fading_out: Option<PlaybackSession>,
    },
    Playing {
        current: PlaybackSession,
    },
    Transitioning {
        current: PlaybackSession,
        previous: PlaybackSession,
    },
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Idle { fading_out: None }
    }
}

impl PlaybackState {
    pub(crate) fn phase(&self) -> PlaybackPhase {
        match self {
            PlaybackState::Idle { .. } => PlaybackPhase::Idle,
            PlaybackState::Playing { .. } => PlaybackPhase::Playing,
            PlaybackState::Transitioning { .. } => PlaybackPhase::Transitioning,
        }
    }

    pub(crate) fn current(&self) -> Option<&PlaybackSession> {
        match self {
            PlaybackState::Playing { current } | PlaybackState::Transitioning { current, .. } => {
                Some(current)
            }
            PlaybackState::Idle { .. } => None,
        }
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut PlaybackSession> {
        match self {
            PlaybackState::Playing { current } | PlaybackState::Transitioning { current, .. } => {
                Some(current)
            }
            PlaybackState::Idle { .. } => None,
        }
    }

    pub(crate) fn previous(&self) -> Option<&PlaybackSession> {
        match self {
            PlaybackState::Idle { fading_out } => fading_out.as_ref(),
            PlaybackState::Transitioning { previous, .. } => Some(previous),
            PlaybackState::Playing { .. } => None,
        }
    }

    pub(crate) fn previous_mut(&mut self) -> Option<&mut PlaybackSession> {
        match self {
            PlaybackState::Idle { fading_out } => fading_out.as_mut(),
            PlaybackState::Transitioning { previous, .. } => Some(previous),
            PlaybackState::Playing { .. } => None,
        }
    }

    /// Detach the fading-out session, leaving the current one in place.
    pub(crate) fn take_previous(&mut self) -> Option<PlaybackSession> {
        match mem::take(self) {
            PlaybackState::Idle { fading_out } => fading_out,
            PlaybackState::Playing { current } => {
                *self = PlaybackState::Playing { current };
                None
            }
            PlaybackState::Transitioning { current, previous } => {
                *self = PlaybackState::Playing { current };
                Some(previous)
            }
        }
    }

    /// Detach the current session; a fading-out session stays.
    pub(crate) fn take_current(&mut self) -> Option<PlaybackSession> {
        match mem::take(self) {
            PlaybackState::Idle { fading_out } => {
                *self = PlaybackState::Idle { fading_out };
                None
            }
            PlaybackState::Playing { current } => Some(current),
            PlaybackState::Transitioning { current, previous } => {
                *self = PlaybackState::Idle {
                    fading_out: Some(previous),
                };
                Some(current)
            }
        }
    }

    /// Put `session` in the previous slot. Any current session is kept.
    pub(crate) fn set_previous(&mut self, session: PlaybackSession) -> Option<PlaybackSession> {
        let (replaced, next) = match mem::take(self) {
            PlaybackState::Idle { fading_out } => (
                fading_out,
                PlaybackState::Idle {
                    fading_out: Some(session),
                },
            ),
            PlaybackState::Playing { current } => (
                None,
                PlaybackState::Transitioning {
                    current,
                    previous: session,
                },
            ),
            PlaybackState::Transitioning { current, previous } => (
                Some(previous),
                PlaybackState::Transitioning {
                    current,
                    previous: session,
                },
            ),
        };
        *self = next;
        replaced
    }

    /// Install `session` as current. Returns a displaced current session.
    pub(crate) fn set_current(&mut self, session: PlaybackSession) -> Option<PlaybackSession> {
        let (replaced, next) = match mem::take(self) {
            PlaybackState::Idle { fading_out: None } => {
                (None, PlaybackState::Playing { current: session })
            }
            PlaybackState::Idle {
                fading_out: Some(previous),
            } => (
                None,
                PlaybackState::Transitioning {
                    current: session,
                    previous,
                },
            ),
            PlaybackState::Playing { current } => {
                (Some(current), PlaybackState::Playing { current: session })
            }
            PlaybackState::Transitioning { current, previous } => (
                Some(current),
                PlaybackState::Transitioning {
                    current: session,
                    previous,
                },
            ),
        };
        *self = next;
        replaced
    }
}
