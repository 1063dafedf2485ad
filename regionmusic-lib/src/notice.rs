//! User-facing notices emitted by the playback controller.
//!
//! Notices are the messages a player would see in chat or a status bar. They
//! are always mirrored to the `log` facade; an optional callback receives them
//! for display.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.text)
    }
}

/// Callback receiving notices for display.
pub type NoticeSink = Arc<dyn Fn(Notice) + Send + Sync>;

/// Log a notice at the matching level and forward it to `sink`.
pub(crate) fn emit(sink: Option<&NoticeSink>, notice: Notice) {
    match notice.level {
        NoticeLevel::Info | NoticeLevel::Success => log::info!("{}", notice.text),
        NoticeLevel::Warning => log::warn!("{}", notice.text),
        NoticeLevel::Error => log::error!("{}", notice.text),
    }
    if let Some(sink) = sink {
        sink(notice);
    }
}
