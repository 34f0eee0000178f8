use crate::managers::dispatcher::{Dispatcher, Route};
use crate::managers::sessions::InputOutcome;
use crate::models::{Completion, UserId};
use crate::services::logger::Logger;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One ordered worker per active user. Events of the same user are handled
/// strictly in arrival order; different users run concurrently. An idle lane
/// removes itself after `idle`.
#[derive(Clone)]
pub struct UserLanes {
    logger: Logger,
    dispatcher: Dispatcher,
    lanes: Arc<DashMap<UserId, mpsc::UnboundedSender<String>>>,
    idle: Duration,
}

impl UserLanes {
    pub fn new(logger: Logger, dispatcher: Dispatcher, idle: Duration) -> Self {
        Self {
            logger: logger.child("lanes"),
            dispatcher,
            lanes: Arc::new(DashMap::new()),
            idle,
        }
    }

    pub fn active_lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Queues `text` on the user's lane. Returns the worker handle when a new
    /// lane had to be started.
    pub fn dispatch(&self, user: UserId, text: String) -> Option<JoinHandle<()>> {
        let mut spawned = None;
        // Send under the entry lock so an idle lane cannot retire between
        // lookup and send.
        let entry = self.lanes.entry(user.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            spawned = Some(tokio::spawn(self.clone().run_lane(user.clone(), rx)));
            tx
        });
        if entry.send(text).is_err() {
            self.logger.error(
                "lane closed unexpectedly",
                Some(&serde_json::json!({"user_id": user})),
            );
        }
        spawned
    }

    /// Stops accepting events. Workers finish what is queued, then exit.
    pub fn close(&self) {
        self.lanes.clear();
    }

    async fn run_lane(self, user: UserId, mut rx: mpsc::UnboundedReceiver<String>) {
        let mut provisioning: Vec<JoinHandle<Completion>> = Vec::new();
        loop {
            match tokio::time::timeout(self.idle, rx.recv()).await {
                Ok(Some(text)) => {
                    let route = self.dispatcher.handle(&user, &text).await;
                    if let Route::Conversation(InputOutcome::Provisioning(handle)) = route {
                        provisioning.push(handle);
                    }
                    provisioning.retain(|handle| !handle.is_finished());
                }
                Ok(None) => break,
                Err(_) => {
                    if self
                        .lanes
                        .remove_if(&user, |_, _| rx.is_empty())
                        .is_some()
                    {
                        break;
                    }
                }
            }
        }
        for handle in provisioning {
            if handle.await.is_err() {
                self.logger.error(
                    "provisioning task aborted",
                    Some(&serde_json::json!({"user_id": user})),
                );
            }
        }
    }
}
