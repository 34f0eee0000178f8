use crate::errors::BotError;
use crate::models::UserId;
use std::path::Path;

/// Outbound side of the chat transport. The core decides *that* a message or
/// document goes out; rendering and transport belong to the implementation.
#[async_trait::async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send_text(&self, user: &UserId, text: &str) -> Result<(), BotError>;

    async fn send_document(
        &self,
        user: &UserId,
        path: &Path,
        display_name: &str,
    ) -> Result<(), BotError>;
}
