//! Authentication collaborator
//!
//! Every connection presents a token before any command is accepted. The
//! authenticator turns it into a verified user id and rating.

use crate::config::AuthMode;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use surge_core::PlayerId;
use thiserror::Error;

/// Rating given to dev-mode users who do not state one
pub const DEFAULT_RATING: i32 = 1200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: PlayerId,
    pub rating: i32,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, rating: i32) -> Self {
        Self {
            user_id: PlayerId::new(user_id),
            rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("unknown token")]
    UnknownToken,
    #[error("malformed token")]
    Malformed,
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Fixed token -> identity table
pub struct StaticTokens {
    tokens: FxHashMap<String, Identity>,
}

impl StaticTokens {
    pub fn new(tokens: FxHashMap<String, Identity>) -> Self {
        Self { tokens }
    }
}

impl Authenticator for StaticTokens {
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens.get(token).cloned().ok_or(AuthError::UnknownToken)
    }
}

/// Trusts `user` or `user:rating` tokens verbatim
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let (user, rating) = match token.split_once(':') {
            Some((user, rating)) => {
                let rating = rating.parse().map_err(|_| AuthError::Malformed)?;
                (user, rating)
            }
            None => (token, DEFAULT_RATING),
        };
        if user.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if !user.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AuthError::Malformed);
        }
        Ok(Identity::new(user, rating))
    }
}

pub fn from_config(mode: &AuthMode) -> Arc<dyn Authenticator> {
    match mode {
        AuthMode::Dev => Arc::new(DevAuthenticator),
        AuthMode::Tokens { tokens } => Arc::new(StaticTokens::new(
            tokens
                .iter()
                .map(|(token, entry)| (token.clone(), Identity::new(entry.user_id.clone(), entry.rating)))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenEntry;

    #[test]
    fn test_dev_tokens() {
        let auth = DevAuthenticator;
        assert_eq!(auth.authenticate("alice:1650").unwrap(), Identity::new("alice", 1650));
        assert_eq!(auth.authenticate("bob").unwrap().rating, DEFAULT_RATING);
        assert_eq!(auth.authenticate("carol:high"), Err(AuthError::Malformed));
        assert_eq!(auth.authenticate(""), Err(AuthError::MissingToken));
        assert_eq!(auth.authenticate("a b"), Err(AuthError::Malformed));
    }

    #[test]
    fn test_static_tokens_from_config() {
        let mut tokens = FxHashMap::default();
        tokens.insert(
            "s3cret".to_string(),
            TokenEntry {
                user_id: "alice".into(),
                rating: 1710,
            },
        );
        let auth = from_config(&AuthMode::Tokens { tokens });
        assert_eq!(auth.authenticate("s3cret").unwrap(), Identity::new("alice", 1710));
        assert_eq!(auth.authenticate("guess"), Err(AuthError::UnknownToken));
    }
}
