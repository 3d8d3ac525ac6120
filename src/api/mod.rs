// SPDX-License-Identifier: MIT

//! Backend plumbing shared by every classification component.

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::ApiClient;
pub use config::Config;
pub use error::{ClassifierError, Result};
pub use session::{AuthState, Role, Session, User};
