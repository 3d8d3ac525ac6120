// SPDX-License-Identifier: MIT

pub mod condition;
pub mod jobs;
pub mod preview;
pub mod rules;
pub mod server;
