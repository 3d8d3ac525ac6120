// SPDX-License-Identifier: MIT

//! Background collaborators: the refresh-job poll loop and debounced autosave

mod autosave;
mod poller;

pub use autosave::{
    Answer, AutoSaver, ResponseDraft, SaveSink, SaveState, SaveStatus, DEFAULT_AUTOSAVE_DELAY,
};
pub use poller::{
    DataRefresh, JobPoller, JobSnapshot, JobState, JobStatusSource, PollFinish, PollHandle,
    PollOutcome, DEFAULT_POLL_INTERVAL,
};
