// SPDX-License-Identifier: MIT

//! Explicit session context
//!
//! Components receive a [`Session`] instead of reading a global user. The
//! state starts `Unknown` and resolves exactly once per lookup into
//! `Authenticated` or `Anonymous`.

use super::client::ApiClient;
use super::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};

/// Roles known to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    #[serde(other)]
    Other,
}

/// The signed-in user as reported by `/api/auth/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn new(username: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Authentication state machine: `Unknown -> Authenticated | Anonymous`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthState {
    #[default]
    Unknown,
    Authenticated(User),
    Anonymous,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    state: AuthState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            state: AuthState::Authenticated(user),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            state: AuthState::Anonymous,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.state, AuthState::Unknown)
    }

    /// Ask the backend who is signed in
    pub async fn resolve(&mut self, client: &ApiClient) -> Result<&AuthState> {
        self.state = match client.auth_status().await? {
            Some(user) => {
                log::info!("Signed in as {} ({:?})", user.username, user.roles);
                AuthState::Authenticated(user)
            }
            None => {
                log::info!("No active session");
                AuthState::Anonymous
            }
        };
        Ok(&self.state)
    }

    pub fn sign_out(&mut self) {
        self.state = AuthState::Anonymous;
    }

    /// The user, provided they hold the `ADMIN` role
    pub fn require_admin(&self) -> Result<&User> {
        match &self.state {
            AuthState::Authenticated(user) if user.is_admin() => Ok(user),
            AuthState::Authenticated(_) => Err(ClassifierError::Forbidden("Admin".to_string())),
            AuthState::Unknown | AuthState::Anonymous => Err(ClassifierError::Unauthenticated),
        }
    }
}
