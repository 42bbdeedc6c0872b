// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hosting credentials.
//!
//! Publishing requires an access token for the hosting service, the name of
//! the actor the commits are attributed to, and the `owner/name` identifier
//! of the repository. All three come from the environment of the automation
//! job running the publisher.

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Environment variable holding the access token.
pub const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Environment variable holding the actor name.
pub const ACTOR_VAR: &str = "GITHUB_ACTOR";

/// Environment variable holding the `owner/name` repository identifier.
pub const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";

/// Access token for the hosting service.
///
/// Formatting never reveals the token. Use [`AccessToken::expose`] to get at
/// the raw value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Construct new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for AccessToken {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("AccessToken(***)")
    }
}

impl Display for AccessToken {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("***")
    }
}

/// Credentials needed to publish HOWTO branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access token embedded into remote URL.
    pub token: AccessToken,

    /// Actor used as commit author name.
    pub actor: String,

    /// Repository identifier in `owner/name` form.
    pub repository: String,
}

impl Credentials {
    /// Read credentials from process environment.
    ///
    /// # Errors
    ///
    /// - Return [`CredentialError::MissingToken`] if token is unset or empty.
    /// - Return [`CredentialError::MissingVariable`] if actor or repository
    ///   is unset or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through arbitrary variable lookup.
    ///
    /// Token is checked first so that a missing token is always the reported
    /// failure when several variables are absent.
    ///
    /// # Errors
    ///
    /// - Return [`CredentialError::MissingToken`] if token is unset or empty.
    /// - Return [`CredentialError::MissingVariable`] if actor or repository
    ///   is unset or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_VAR)
            .filter(|value| !value.is_empty())
            .ok_or(CredentialError::MissingToken)?;

        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(CredentialError::MissingVariable { name })
        };

        Ok(Self {
            token: AccessToken::new(token),
            actor: required(ACTOR_VAR)?,
            repository: required(REPOSITORY_VAR)?,
        })
    }

    /// Commit author email for actor under `domain`.
    pub fn author_email(&self, domain: &str) -> String {
        format!("{}@{}", self.actor, domain)
    }
}

/// Credential error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Access token is absent.
    #[error("GITHUB_TOKEN is not set; refusing to publish HOWTO branches")]
    MissingToken,

    /// Some other required variable is absent.
    #[error("{name} is not set")]
    MissingVariable { name: &'static str },
}

/// Friendly result alias :3
pub type Result<T, E = CredentialError> = std::result::Result<T, E>;
