use crate::models::UserId;
use serde::{Deserialize, Serialize};

/// One inbound chat event, one JSON object per line on stdin.
#[derive(Debug, Deserialize)]
pub struct InboundEvent {
    pub user_id: UserId,
    #[serde(default)]
    pub text: String,
}

/// One outbound frame, one JSON object per line on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Message {
        user_id: UserId,
        text: String,
    },
    Document {
        user_id: UserId,
        path: String,
        display_name: String,
    },
}

impl OutboundFrame {
    pub fn user_id(&self) -> &UserId {
        match self {
            OutboundFrame::Message { user_id, .. } | OutboundFrame::Document { user_id, .. } => {
                user_id
            }
        }
    }
}
