use crate::constants::{replies, triggers};
use crate::managers::health::{render_report, ServerHealthChecker};
use crate::managers::sessions::{ConversationSessionManager, InputOutcome, StartOutcome};
use crate::models::{ServerDescriptor, UserId};
use crate::services::delivery::DeliveryGateway;
use crate::services::logger::Logger;
use std::sync::Arc;

#[derive(Debug)]
pub enum Route {
    Welcome,
    Cancelled,
    Status,
    Generate(StartOutcome),
    Conversation(InputOutcome),
    Fallback,
}

/// Routes one inbound text event the way the chat front end does.
#[derive(Clone)]
pub struct Dispatcher {
    logger: Logger,
    sessions: Arc<ConversationSessionManager>,
    health: Arc<ServerHealthChecker>,
    servers: Arc<Vec<ServerDescriptor>>,
    delivery: Arc<dyn DeliveryGateway>,
}

impl Dispatcher {
    pub fn new(
        logger: Logger,
        sessions: Arc<ConversationSessionManager>,
        health: Arc<ServerHealthChecker>,
        servers: Vec<ServerDescriptor>,
        delivery: Arc<dyn DeliveryGateway>,
    ) -> Self {
        Self {
            logger: logger.child("dispatch"),
            sessions,
            health,
            servers: Arc::new(servers),
            delivery,
        }
    }

    pub fn sessions(&self) -> &ConversationSessionManager {
        &self.sessions
    }

    pub async fn handle(&self, user: &UserId, text: &str) -> Route {
        let route = self.route(user, text).await;
        self.logger.debug(
            "event handled",
            Some(&serde_json::json!({"user_id": user, "route": route_label(&route)})),
        );
        route
    }

    async fn route(&self, user: &UserId, text: &str) -> Route {
        if text == triggers::START {
            self.reply(user, replies::WELCOME).await;
            return Route::Welcome;
        }
        if triggers::is_cancel(text) {
            self.sessions.cancel(user);
            self.reply(user, replies::CANCELLED).await;
            return Route::Cancelled;
        }
        if triggers::is_status(text) {
            self.report_status(user).await;
            return Route::Status;
        }
        if triggers::is_generate(text) {
            let outcome = self.sessions.start_request(user);
            let reply = match outcome {
                StartOutcome::Busy => replies::ALREADY_GENERATING,
                StartOutcome::Started | StartOutcome::Restarted => replies::ASK_SECRET,
            };
            self.reply(user, reply).await;
            return Route::Generate(outcome);
        }
        if self.sessions.has_session(user) {
            match self.sessions.submit_input(user, text).await {
                InputOutcome::NoSession => {}
                outcome => return Route::Conversation(outcome),
            }
        }
        self.reply(user, replies::FALLBACK).await;
        Route::Fallback
    }

    async fn report_status(&self, user: &UserId) {
        if self.servers.is_empty() {
            self.reply(user, replies::NO_SERVERS).await;
            return;
        }
        self.reply(user, replies::CHECKING_SERVERS).await;
        let statuses = self.health.check_all(&self.servers).await;
        self.reply(user, &render_report(&statuses)).await;
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

fn route_label(route: &Route) -> &'static str {
    match route {
        Route::Welcome => "welcome",
        Route::Cancelled => "cancel",
        Route::Status => "status",
        Route::Generate(_) => "generate",
        Route::Conversation(_) => "conversation",
        Route::Fallback => "fallback",
    }
}
