// SPDX-License-Identifier: MIT

//! Classification rule tooling for demand intake.
//!
//! - [api] - HTTP client, session state, configuration and the error type
//! - [classification] - condition trees, rule records, evaluation preview,
//!   job polling, autosave and a local development server

pub mod api;
pub mod classification;
