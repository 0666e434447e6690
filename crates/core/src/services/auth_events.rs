//! Authentication event publishing.
//!
//! Services report login, logout and password changes through
//! [`AuthEventPublisher`] so delivery (log line, queue, audit table) stays
//! outside the access core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pollhub_common::AppResult;
use std::sync::Arc;

/// Kinds of authentication events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    /// A user obtained a fresh token pair with credentials.
    Login,
    /// A user's refresh token was revoked.
    Logout,
    /// A user changed their password.
    PasswordChanged,
}

impl AuthEventKind {
    /// Stable name used in log records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PasswordChanged => "password_changed",
        }
    }
}

/// Trait for publishing authentication events.
#[async_trait]
pub trait AuthEventPublisher: Send + Sync {
    /// Publish one event for `user_id` that happened at `at`.
    async fn publish(&self, kind: AuthEventKind, user_id: &str, at: DateTime<Utc>)
    -> AppResult<()>;
}

/// Publisher that writes one structured `info` record per event.
pub struct LoggingAuthEventPublisher;

#[async_trait]
impl AuthEventPublisher for LoggingAuthEventPublisher {
    async fn publish(
        &self,
        kind: AuthEventKind,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        tracing::info!(
            event = kind.as_str(),
            user_id = %user_id,
            at = %at.to_rfc3339(),
            "Auth event"
        );
        Ok(())
    }
}

/// Publisher that discards every event.
pub struct NoOpAuthEventPublisher;

#[async_trait]
impl AuthEventPublisher for NoOpAuthEventPublisher {
    async fn publish(
        &self,
        _kind: AuthEventKind,
        _user_id: &str,
        _at: DateTime<Utc>,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Type alias for a shared auth event publisher.
pub type AuthEventPublisherService = Arc<dyn AuthEventPublisher>;

/// Publish an event, logging instead of failing when delivery breaks.
pub(crate) async fn emit(
    publisher: &AuthEventPublisherService,
    kind: AuthEventKind,
    user_id: &str,
) {
    if let Err(e) = publisher.publish(kind, user_id, Utc::now()).await {
        tracing::warn!(
            event = kind.as_str(),
            user_id = %user_id,
            error = %e,
            "Failed to publish auth event"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Publisher that remembers what it was given.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub events: Mutex<Vec<(AuthEventKind, String)>>,
    }

    #[async_trait]
    impl AuthEventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            kind: AuthEventKind,
            user_id: &str,
            _at: DateTime<Utc>,
        ) -> AppResult<()> {
            if let Ok(mut events) = self.events.lock() {
                events.push((kind, user_id.to_string()));
            }
            Ok(())
        }
    }
}
