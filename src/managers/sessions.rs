use crate::constants::{replies, triggers};
use crate::errors::BotError;
use crate::managers::provisioning::Provisioner;
use crate::models::{
    Completion, ConversationStage, ProvisioningRequest, SessionState, UserId, UserSession,
};
use crate::services::config::Secret;
use crate::services::delivery::DeliveryGateway;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    Restarted,
    /// A provisioning run for this user has not finished yet.
    Busy,
}

#[derive(Debug)]
pub enum InputOutcome {
    NoSession,
    Cancelled,
    Authenticated,
    /// Wrong shared secret; the session is gone.
    Rejected(BotError),
    /// The name cannot be used in a file path; the session is gone.
    InvalidName(BotError),
    /// Resolves once the artifact (or the failure message) has been delivered.
    Provisioning(JoinHandle<Completion>),
}

/// Per-user conversation state. Each transition runs under the session
/// table's per-key lock, so two users never contend on the same entry and
/// one user's racing inputs are applied one at a time. An entry exists only
/// while the user is awaiting the secret or the configuration name; every
/// other input on an entry ends the conversation.
#[derive(Clone)]
pub struct ConversationSessionManager {
    logger: Logger,
    validation: Validation,
    secret: Secret,
    sessions: Arc<DashMap<UserId, UserSession>>,
    in_flight: Arc<DashMap<UserId, String>>,
    provisioner: Arc<dyn Provisioner>,
    delivery: Arc<dyn DeliveryGateway>,
}

impl ConversationSessionManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        secret: Secret,
        provisioner: Arc<dyn Provisioner>,
        delivery: Arc<dyn DeliveryGateway>,
    ) -> Self {
        Self {
            logger: logger.child("sessions"),
            validation,
            secret,
            sessions: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            provisioner,
            delivery,
        }
    }

    pub fn state_of(&self, user: &UserId) -> SessionState {
        self.sessions
            .get(user)
            .map(|entry| SessionState::from(entry.stage))
            .unwrap_or(SessionState::Idle)
    }

    pub fn has_session(&self, user: &UserId) -> bool {
        self.sessions.contains_key(user)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_provisioning(&self, user: &UserId) -> bool {
        self.in_flight.contains_key(user)
    }

    /// Opens (or restarts) the conversation at the secret prompt.
    pub fn start_request(&self, user: &UserId) -> StartOutcome {
        // Lock order: sessions entry, then in_flight.
        let entry = self.sessions.entry(user.clone());
        if self.in_flight.contains_key(user) {
            return StartOutcome::Busy;
        }
        let outcome = match entry {
            Entry::Occupied(mut occupied) => {
                occupied.insert(UserSession::awaiting_secret());
                StartOutcome::Restarted
            }
            Entry::Vacant(vacant) => {
                vacant.insert(UserSession::awaiting_secret());
                StartOutcome::Started
            }
        };
        self.logger.debug(
            "conversation started",
            Some(&serde_json::json!({"user_id": user, "outcome": format!("{:?}", outcome)})),
        );
        outcome
    }

    /// Drops the user's session whatever its state. Returns whether one existed.
    pub fn cancel(&self, user: &UserId) -> bool {
        let removed = self.sessions.remove(user).is_some();
        if removed {
            self.logger
                .debug("conversation cancelled", Some(&serde_json::json!({"user_id": user})));
        }
        removed
    }

    pub async fn submit_input(&self, user: &UserId, text: &str) -> InputOutcome {
        if triggers::is_cancel(text) {
            self.cancel(user);
            self.reply(user, replies::CANCELLED).await;
            return InputOutcome::Cancelled;
        }

        let step = self.advance(user, text);
        match step {
            Step::NoSession => InputOutcome::NoSession,
            Step::Authenticated => {
                self.reply(user, replies::SECRET_ACCEPTED).await;
                InputOutcome::Authenticated
            }
            Step::Rejected(err) => {
                self.log_conversation_failure("shared secret rejected", user, &err);
                self.reply(user, replies::SECRET_REJECTED).await;
                InputOutcome::Rejected(err)
            }
            Step::InvalidName(err) => {
                self.log_conversation_failure("configuration name rejected", user, &err);
                self.reply(user, &err.user_message()).await;
                InputOutcome::InvalidName(err)
            }
            Step::Provision(request) => {
                self.reply(user, replies::GENERATING).await;
                InputOutcome::Provisioning(self.spawn_provisioning(request))
            }
        }
    }

    /// Applies one input to the state machine under the entry lock. No
    /// awaiting happens while the lock is held.
    fn advance(&self, user: &UserId, text: &str) -> Step {
        let Entry::Occupied(mut occupied) = self.sessions.entry(user.clone()) else {
            return Step::NoSession;
        };
        let stage = occupied.get().stage;
        match stage {
            ConversationStage::AwaitingSecret => {
                if text == self.secret.expose() {
                    occupied.get_mut().stage = ConversationStage::AwaitingConfigName;
                    Step::Authenticated
                } else {
                    occupied.remove();
                    Step::Rejected(BotError::denied("Incorrect shared secret"))
                }
            }
            ConversationStage::AwaitingConfigName => {
                let config_name = match self.validation.ensure_config_name(text) {
                    Ok(name) => name,
                    Err(err) => {
                        occupied.remove();
                        return Step::InvalidName(err);
                    }
                };
                occupied.get_mut().config_name = Some(config_name.clone());
                self.in_flight.insert(user.clone(), config_name);
                match occupied.remove().into_request(user.clone()) {
                    Some(request) => Step::Provision(request),
                    None => Step::NoSession,
                }
            }
        }
    }

    fn log_conversation_failure(&self, message: &str, user: &UserId, err: &BotError) {
        self.logger.warn(
            message,
            Some(&serde_json::json!({
                "user_id": user,
                "kind": err.kind,
                "code": err.code,
                "error": err.message,
            })),
        );
    }

    fn spawn_provisioning(&self, request: ProvisioningRequest) -> JoinHandle<Completion> {
        let manager = self.clone();
        tokio::spawn(async move {
            let completion = manager.run_provisioning(&request).await;
            manager.in_flight.remove(&request.user_id);
            completion
        })
    }

    async fn run_provisioning(&self, request: &ProvisioningRequest) -> Completion {
        let user = &request.user_id;
        match self.provisioner.provision(request).await {
            Ok(artifact) => {
                self.reply(user, replies::DELIVERY_HEADER).await;
                if let Err(err) = self
                    .delivery
                    .send_document(user, &artifact.local_path, &artifact.display_name)
                    .await
                {
                    self.logger.error(
                        "artifact delivery failed",
                        Some(&serde_json::json!({"user_id": user, "error": err.message})),
                    );
                    return Completion::Failed(err.message);
                }
                Completion::Succeeded
            }
            Err(err) => {
                self.reply(user, &err.user_message()).await;
                Completion::Failed(err.message)
            }
        }
    }

    async fn reply(&self, user: &UserId, text: &str) {
        if let Err(err) = self.delivery.send_text(user, text).await {
            self.logger.warn(
                "reply delivery failed",
                Some(&serde_json::json!({"user_id": user, "error": err.message})),
            );
        }
    }
}

enum Step {
    NoSession,
    Authenticated,
    Rejected(BotError),
    InvalidName(BotError),
    Provision(ProvisioningRequest),
}
