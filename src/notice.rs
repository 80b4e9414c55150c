// src/notice.rs
//! The single page-level banner. Component-local failures never reach it.

use std::sync::Mutex;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Transport,
    /// Actionable: the user should sign in.
    AuthRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn from_error(context: &str, err: &ClientError) -> Option<Self> {
        match err {
            ClientError::Cancelled => None,
            ClientError::AuthRequired => Some(Notice {
                kind: NoticeKind::AuthRequired,
                message: "Sign in to use SYNTH search and saved preferences.".into(),
            }),
            other => Some(Notice {
                kind: NoticeKind::Transport,
                message: format!("{context} failed: {other}"),
            }),
        }
    }
}

/// Latest notice wins; dismissing clears it.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Mutex<Option<Notice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, notice: Notice) {
        tracing::info!(target: "dashboard", kind = ?notice.kind, message = %notice.message, "notice raised");
        *self.current.lock().expect("notice mutex poisoned") = Some(notice);
    }

    /// Raise the notice an error maps to (cancellation maps to none).
    pub fn raise_error(&self, context: &str, err: &ClientError) {
        if let Some(n) = Notice::from_error(context, err) {
            self.raise(n);
        }
    }

    pub fn current(&self) -> Option<Notice> {
        self.current.lock().expect("notice mutex poisoned").clone()
    }

    pub fn dismiss(&self) {
        *self.current.lock().expect("notice mutex poisoned") = None;
    }
}
