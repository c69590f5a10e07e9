// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::OffsetDateTime;

/// Who is signed in and how requests authenticate. Read-only once built.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    user: String,
    token: Option<String>,
    expires_at: Option<OffsetDateTime>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self {
            user: String::new(),
            token: None,
            expires_at: None,
        }
    }

    pub fn new(user: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user: user.into(),
            token: token.filter(|token| !token.trim().is_empty()),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn display_user(&self) -> &str {
        if self.user.is_empty() {
            "anonymous"
        } else {
            &self.user
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionContext;
    use time::macros::datetime;

    #[test]
    fn blank_token_is_dropped() {
        let session = SessionContext::new("ana", Some("  ".to_owned()));
        assert_eq!(session.bearer_token(), None);
        assert_eq!(session.display_user(), "ana");
        assert_eq!(SessionContext::anonymous().display_user(), "anonymous");
    }

    #[test]
    fn expiry_is_inclusive() {
        let session = SessionContext::new("ana", Some("t".to_owned()))
            .with_expiry(datetime!(2026-05-01 12:00 UTC));
        assert!(!session.is_expired_at(datetime!(2026-05-01 11:59 UTC)));
        assert!(session.is_expired_at(datetime!(2026-05-01 12:00 UTC)));
    }

    #[test]
    fn debug_output_redacts_token() {
        let session = SessionContext::new("ana", Some("secret-token".to_owned()));
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
