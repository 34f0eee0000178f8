use super::lanes::UserLanes;
use super::protocol::{InboundEvent, OutboundFrame};
use crate::app::App;
use crate::constants::limits::{LANE_IDLE_MS, LOG_SUBSTRING_LENGTH};
use crate::errors::BotError;
use crate::models::UserId;
use crate::services::config::BotConfig;
use crate::services::delivery::DeliveryGateway;
use crate::services::logger::Logger;
use crate::utils::text::single_line;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

/// Delivery side of the stdio gateway: frames are queued to a single writer.
#[derive(Clone)]
pub struct StdioDelivery {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

pub fn outbound_channel() -> (StdioDelivery, mpsc::UnboundedReceiver<OutboundFrame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StdioDelivery { tx }, rx)
}

impl StdioDelivery {
    fn push(&self, frame: OutboundFrame) -> Result<(), BotError> {
        self.tx
            .send(frame)
            .map_err(|_| BotError::internal("Outbound channel is closed"))
    }
}

#[async_trait::async_trait]
impl DeliveryGateway for StdioDelivery {
    async fn send_text(&self, user: &UserId, text: &str) -> Result<(), BotError> {
        self.push(OutboundFrame::Message {
            user_id: user.clone(),
            text: text.to_string(),
        })
    }

    async fn send_document(
        &self,
        user: &UserId,
        path: &Path,
        display_name: &str,
    ) -> Result<(), BotError> {
        self.push(OutboundFrame::Document {
            user_id: user.clone(),
            path: path.display().to_string(),
            display_name: display_name.to_string(),
        })
    }
}

/// Writes frames as JSON lines until every sender is gone.
pub async fn write_frames<W>(
    mut frames: mpsc::UnboundedReceiver<OutboundFrame>,
    writer: W,
) -> Result<(), BotError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    while let Some(frame) = frames.recv().await {
        let payload = serde_json::to_string(&frame)
            .map_err(|err| BotError::internal(format!("Failed to encode frame: {}", err)))?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Reads inbound events line by line and hands them to the user lanes.
/// Returns after EOF once every lane has drained, including in-flight
/// provisioning runs.
pub async fn serve<R>(reader: R, lanes: UserLanes, logger: &Logger) -> Result<(), BotError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut workers = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: InboundEvent = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(err) => {
                logger.warn(
                    "skipping malformed event",
                    Some(&serde_json::json!({
                        "error": err.to_string(),
                        "line": single_line(&trimmed.chars().take(LOG_SUBSTRING_LENGTH).collect::<String>()),
                    })),
                );
                continue;
            }
        };
        if let Some(worker) = lanes.dispatch(event.user_id, event.text) {
            workers.push(worker);
        }
        workers.retain(|worker| !worker.is_finished());
    }

    logger.info(
        "input closed, draining",
        Some(&serde_json::json!({"lanes": lanes.active_lanes()})),
    );
    lanes.close();
    for worker in workers {
        if worker.await.is_err() {
            logger.error("lane worker aborted", None);
        }
    }
    Ok(())
}

pub async fn run_stdio(config: BotConfig, logger: Logger) -> Result<(), BotError> {
    let gateway_logger = logger.child("gateway");
    let (delivery, frames) = outbound_channel();
    let writer = tokio::spawn(write_frames(frames, tokio::io::stdout()));

    let app = App::initialize(config, logger, Arc::new(delivery))?;
    let lanes = UserLanes::new(
        app.logger.clone(),
        app.dispatcher.clone(),
        Duration::from_millis(LANE_IDLE_MS),
    );
    gateway_logger.info(
        "listening for events on stdin",
        Some(&serde_json::json!({"servers": app.servers.len()})),
    );
    let served = serve(BufReader::new(tokio::io::stdin()), lanes, &gateway_logger).await;
    drop(app);

    writer
        .await
        .map_err(|_| BotError::internal("Output writer task failed"))??;
    served
}
