#![allow(dead_code)]

use ovpn_bot::app::App;
use ovpn_bot::errors::BotError;
use ovpn_bot::gateway::protocol::OutboundFrame;
use ovpn_bot::managers::provisioning::Provisioner;
use ovpn_bot::models::{ProvisioningArtifact, ProvisioningRequest, UserId};
use ovpn_bot::services::config::BotConfig;
use ovpn_bot::services::delivery::DeliveryGateway;
use ovpn_bot::services::logger::{LogLevel, Logger};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

pub const SECRET: &str = "open-sesame";

pub fn tmp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
}

pub fn quiet_logger() -> Logger {
    let mut logger = Logger::new("test");
    logger.set_level(LogLevel::Error);
    logger
}

pub fn test_config(extra: &[(&str, &str)]) -> BotConfig {
    let mut env: HashMap<String, String> = [
        ("BOT_PASSWORD", SECRET),
        ("CA_PASSPHRASE", "ca-pass"),
        ("VPN_SERVER_IP", "127.0.0.1"),
        ("PASSWORD", "root-pass"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in extra {
        env.insert(key.to_string(), value.to_string());
    }
    BotConfig::from_lookup(move |key| env.get(key).cloned()).expect("test config")
}

#[derive(Default)]
pub struct RecordingDelivery {
    frames: Mutex<Vec<OutboundFrame>>,
}

impl RecordingDelivery {
    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frames_for(&self, user: &UserId) -> Vec<OutboundFrame> {
        self.frames()
            .into_iter()
            .filter(|frame| frame.user_id() == user)
            .collect()
    }

    pub fn texts_for(&self, user: &UserId) -> Vec<String> {
        self.frames_for(user)
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn documents_for(&self, user: &UserId) -> Vec<(String, String)> {
        self.frames_for(user)
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Document {
                    path, display_name, ..
                } => Some((path, display_name)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DeliveryGateway for RecordingDelivery {
    async fn send_text(&self, user: &UserId, text: &str) -> Result<(), BotError> {
        self.frames.lock().unwrap().push(OutboundFrame::Message {
            user_id: user.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        user: &UserId,
        path: &Path,
        display_name: &str,
    ) -> Result<(), BotError> {
        self.frames.lock().unwrap().push(OutboundFrame::Document {
            user_id: user.clone(),
            path: path.display().to_string(),
            display_name: display_name.to_string(),
        });
        Ok(())
    }
}

/// Stands in for the remote host: records requests and answers after `delay`.
pub struct ScriptedProvisioner {
    calls: Mutex<Vec<ProvisioningRequest>>,
    failure: Option<BotError>,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProvisioner {
    pub fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: None,
            delay: Duration::from_millis(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: BotError) -> Self {
        Self {
            failure: Some(err),
            ..Self::succeeding()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ProvisioningRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provisioner for ScriptedProvisioner {
    async fn provision(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningArtifact, BotError> {
        self.calls.lock().unwrap().push(request.clone());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let file_name = format!("{}.ovpn", request.config_name);
        Ok(ProvisioningArtifact {
            local_path: PathBuf::from("./downloads").join(&file_name),
            remote_source_path: format!("/root/clients/{}", file_name),
            display_name: file_name,
            bytes: 0,
            sha256: String::new(),
        })
    }
}

pub struct Harness {
    pub app: App,
    pub delivery: Arc<RecordingDelivery>,
    pub provisioner: Arc<ScriptedProvisioner>,
}

pub fn harness_with(provisioner: ScriptedProvisioner, extra: &[(&str, &str)]) -> Harness {
    let delivery = Arc::new(RecordingDelivery::default());
    let provisioner = Arc::new(provisioner);
    let app = App::with_provisioner(
        test_config(extra),
        quiet_logger(),
        delivery.clone(),
        provisioner.clone(),
    )
    .expect("app");
    Harness {
        app,
        delivery,
        provisioner,
    }
}

pub fn harness(provisioner: ScriptedProvisioner) -> Harness {
    harness_with(provisioner, &[])
}
