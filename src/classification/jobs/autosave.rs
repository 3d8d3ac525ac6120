// SPDX-License-Identifier: MIT

//! Debounced autosave
//!
//! Every edit restarts the debounce timer; when it fires, only the newest
//! value is sent. Each save carries the edit sequence number it was made
//! for, and a response only becomes the confirmed value if no later edit
//! exists. Slow responses for superseded edits are dropped.

use crate::api::{ClassifierError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

/// Persists one value
#[async_trait]
pub trait SaveSink<T: Send + Sync>: Send + Sync {
    /// Save `value` for edit number `seq`, returning what was stored
    async fn save(&self, seq: u64, value: &T) -> Result<T>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Idle,
    /// Edit `seq` is waiting for the debounce timer
    Pending { seq: u64 },
    Saving { seq: u64 },
    Saved { seq: u64 },
    Failed { seq: u64, message: String },
}

/// Snapshot published after every state change
#[derive(Debug, Clone, PartialEq)]
pub struct SaveState<T> {
    pub status: SaveStatus,
    /// Sequence number of the newest edit
    pub latest_edit: u64,
    /// Last value the sink confirmed for the newest edit
    pub confirmed: Option<T>,
}

impl<T> Default for SaveState<T> {
    fn default() -> Self {
        Self {
            status: SaveStatus::Idle,
            latest_edit: 0,
            confirmed: None,
        }
    }
}

enum Command<T> {
    Edit(T),
    Flush,
}

/// Handle to a running autosave task
pub struct AutoSaver<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
    state: watch::Receiver<SaveState<T>>,
    task: JoinHandle<()>,
}

impl<T> AutoSaver<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn(sink: Arc<dyn SaveSink<T>>, delay: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SaveState::default());
        let task = tokio::spawn(run(sink, delay, rx, state_tx));
        Self {
            commands,
            state,
            task,
        }
    }

    /// Record a new value and restart the debounce timer
    pub fn edit(&self, value: T) -> Result<()> {
        self.send(Command::Edit(value))
    }

    /// Save the pending value now instead of waiting
    pub fn flush(&self) -> Result<()> {
        self.send(Command::Flush)
    }

    pub fn state(&self) -> SaveState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState<T>> {
        self.state.clone()
    }

    /// Save whatever is pending, wait for in-flight saves, and stop
    pub async fn shutdown(self) -> SaveState<T> {
        let AutoSaver {
            commands,
            state,
            task,
        } = self;
        drop(commands);
        if let Err(e) = task.await {
            log::error!("Autosave task ended abnormally: {}", e);
        }
        let last = state.borrow().clone();
        last
    }

    fn send(&self, command: Command<T>) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ClassifierError::Other("autosave has stopped".to_string()))
    }
}

struct Saver<T> {
    sink: Arc<dyn SaveSink<T>>,
    state: watch::Sender<SaveState<T>>,
    in_flight: JoinSet<(u64, Result<T>)>,
    latest_edit: u64,
}

impl<T> Saver<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn publish(&self, status: SaveStatus) {
        let latest_edit = self.latest_edit;
        self.state.send_modify(|s| {
            s.status = status;
            s.latest_edit = latest_edit;
        });
    }

    fn start_save(&mut self, seq: u64, value: T) {
        let sink = self.sink.clone();
        self.in_flight.spawn(async move {
            let result = sink.save(seq, &value).await;
            (seq, result)
        });
        log::debug!("Autosave started for edit {}", seq);
        self.publish(SaveStatus::Saving { seq });
    }

    fn finish_save(&mut self, seq: u64, result: Result<T>) {
        if seq != self.latest_edit {
            log::debug!(
                "Discarding response for edit {}, edit {} is newer",
                seq,
                self.latest_edit
            );
            return;
        }
        match result {
            Ok(stored) => {
                self.state.send_modify(|s| s.confirmed = Some(stored));
                self.publish(SaveStatus::Saved { seq });
            }
            Err(e) => {
                log::warn!("Autosave of edit {} failed: {}", seq, e);
                self.publish(SaveStatus::Failed {
                    seq,
                    message: e.user_message(),
                });
            }
        }
    }

    fn joined(&mut self, joined: std::result::Result<(u64, Result<T>), tokio::task::JoinError>) {
        match joined {
            Ok((seq, result)) => self.finish_save(seq, result),
            Err(e) => log::error!("Autosave request task failed: {}", e),
        }
    }
}

async fn run<T>(
    sink: Arc<dyn SaveSink<T>>,
    delay: Duration,
    mut commands: mpsc::UnboundedReceiver<Command<T>>,
    state: watch::Sender<SaveState<T>>,
) where
    T: Clone + Send + Sync + 'static,
{
    let mut saver = Saver {
        sink,
        state,
        in_flight: JoinSet::new(),
        latest_edit: 0,
    };
    let mut pending: Option<T> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Edit(value)) => {
                    saver.latest_edit += 1;
                    pending = Some(value);
                    deadline = Some(Instant::now() + delay);
                    saver.publish(SaveStatus::Pending { seq: saver.latest_edit });
                }
                Some(Command::Flush) => {
                    if pending.is_some() {
                        deadline = Some(Instant::now());
                    }
                }
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if let Some(value) = pending.take() {
                    let seq = saver.latest_edit;
                    saver.start_save(seq, value);
                }
            }
            Some(joined) = saver.in_flight.join_next(), if !saver.in_flight.is_empty() => {
                saver.joined(joined);
            }
        }
    }

    if let Some(value) = pending.take() {
        let seq = saver.latest_edit;
        saver.start_save(seq, value);
    }
    while let Some(joined) = saver.in_flight.join_next().await {
        saver.joined(joined);
    }
    log::debug!("Autosave stopped after {} edits", saver.latest_edit);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "N_A")]
    NotApplicable,
}

/// One requirement answer in an assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDraft {
    pub requirement_id: i64,
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ResponseDraft {
    pub fn new(requirement_id: i64, answer: Answer) -> Self {
        Self {
            requirement_id,
            answer,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every save; edit 1 optionally answers slowly
    #[derive(Default)]
    struct RecordingSink {
        saves: Mutex<Vec<(u64, String)>>,
        slow_first: Option<Duration>,
    }

    impl RecordingSink {
        fn saves(&self) -> Vec<(u64, String)> {
            self.saves.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SaveSink<String> for RecordingSink {
        async fn save(&self, seq: u64, value: &String) -> Result<String> {
            self.saves.lock().unwrap().push((seq, value.clone()));
            if let (1, Some(delay)) = (seq, self.slow_first) {
                tokio::time::sleep(delay).await;
            }
            if value == "fail" {
                return Err(ClassifierError::api(500, "Could not save response"));
            }
            Ok(value.clone())
        }
    }

    fn sleep_ms(ms: u64) -> tokio::time::Sleep {
        tokio::time::sleep(Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_saves_once_with_last_value() {
        let sink = Arc::new(RecordingSink::default());
        let saver = AutoSaver::<String>::spawn(sink.clone(), DEFAULT_AUTOSAVE_DELAY);

        saver.edit("Y".to_string()).unwrap();
        sleep_ms(500).await;
        saver.edit("Ye".to_string()).unwrap();
        sleep_ms(500).await;
        saver.edit("Yes".to_string()).unwrap();

        sleep_ms(1999).await;
        assert!(sink.saves().is_empty());
        sleep_ms(1000).await;

        assert_eq!(sink.saves(), vec![(3, "Yes".to_string())]);
        let state = saver.state();
        assert_eq!(state.status, SaveStatus::Saved { seq: 3 });
        assert_eq!(state.confirmed.as_deref(), Some("Yes"));

        let last = saver.shutdown().await;
        assert_eq!(last.latest_edit, 3);
        assert_eq!(sink.saves().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_save_separately() {
        let sink = Arc::new(RecordingSink::default());
        let saver = AutoSaver::<String>::spawn(sink.clone(), DEFAULT_AUTOSAVE_DELAY);

        saver.edit("first".to_string()).unwrap();
        sleep_ms(3000).await;
        saver.edit("second".to_string()).unwrap();
        sleep_ms(3000).await;

        assert_eq!(
            sink.saves(),
            vec![(1, "first".to_string()), (2, "second".to_string())]
        );
        saver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let sink = Arc::new(RecordingSink {
            slow_first: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let saver = AutoSaver::<String>::spawn(sink.clone(), DEFAULT_AUTOSAVE_DELAY);

        // edit 1 starts saving at t=2 and answers at t=7
        saver.edit("old".to_string()).unwrap();
        sleep_ms(3000).await;
        // edit 2 saves at t=5 and answers at once
        saver.edit("new".to_string()).unwrap();
        sleep_ms(2500).await;
        assert_eq!(saver.state().confirmed.as_deref(), Some("new"));

        sleep_ms(5000).await;
        let state = saver.state();
        assert_eq!(state.confirmed.as_deref(), Some("new"));
        assert_eq!(state.status, SaveStatus::Saved { seq: 2 });
        assert_eq!(sink.saves().len(), 2);
        saver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported() {
        let sink = Arc::new(RecordingSink::default());
        let saver = AutoSaver::<String>::spawn(sink, DEFAULT_AUTOSAVE_DELAY);

        saver.edit("fail".to_string()).unwrap();
        sleep_ms(2500).await;
        assert_eq!(
            saver.state().status,
            SaveStatus::Failed {
                seq: 1,
                message: "Could not save response".to_string()
            }
        );
        assert!(saver.state().confirmed.is_none());
        saver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_shutdown_save_pending_edit() {
        let sink = Arc::new(RecordingSink::default());
        let saver = AutoSaver::<String>::spawn(sink.clone(), DEFAULT_AUTOSAVE_DELAY);

        saver.edit("a".to_string()).unwrap();
        saver.flush().unwrap();
        sleep_ms(10).await;
        assert_eq!(sink.saves(), vec![(1, "a".to_string())]);

        saver.edit("b".to_string()).unwrap();
        let last = saver.shutdown().await;
        assert_eq!(sink.saves().len(), 2);
        assert_eq!(last.confirmed.as_deref(), Some("b"));
    }

    #[test]
    fn test_response_draft_wire_format() {
        let draft = ResponseDraft::new(12, Answer::NotApplicable).with_comment("legacy system");
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            serde_json::json!({"requirementId": 12, "answer": "N_A", "comment": "legacy system"})
        );
        let plain = ResponseDraft::new(3, Answer::Yes);
        assert_eq!(
            serde_json::to_string(&plain).unwrap(),
            r#"{"requirementId":3,"answer":"YES"}"#
        );
    }
}
