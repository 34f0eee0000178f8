//! Remote provisioning: one fresh SSH connection per request, an interactive
//! run of the certificate issuance program, then an SFTP copy of the
//! generated profile into the local staging directory.

pub mod driver;
mod ssh;
pub mod transfer;

use crate::errors::BotError;
use crate::models::{ProvisioningArtifact, ProvisioningRequest};
use crate::services::config::ProvisioningSettings;
use crate::services::logger::Logger;
use std::sync::Arc;
use std::time::Instant;

#[async_trait::async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningArtifact, BotError>;
}

#[derive(Clone)]
pub struct SshProvisioner {
    logger: Logger,
    settings: Arc<ProvisioningSettings>,
}

impl SshProvisioner {
    pub fn new(logger: Logger, settings: ProvisioningSettings) -> Self {
        Self {
            logger: logger.child("provision"),
            settings: Arc::new(settings),
        }
    }
}

fn provision_blocking(
    settings: &ProvisioningSettings,
    request: &ProvisioningRequest,
    logger: &Logger,
) -> Result<ProvisioningArtifact, BotError> {
    let remote_path = settings.remote_artifact_path(&request.config_name);
    let local_path = settings.local_artifact_path(&request.config_name);

    let session = ssh::connect_session(&settings.ssh)?;
    logger.debug(
        "connected to provisioning host",
        Some(&serde_json::json!({"host": settings.ssh.host, "port": settings.ssh.port})),
    );

    let transcript = ssh::run_issuance(&session, settings, &request.config_name)?;
    logger.debug(
        "issuance program finished",
        Some(&serde_json::json!({
            "output": transcript.tail(&[settings.ca_passphrase.expose()]),
        })),
    );

    let sftp = session
        .sftp()
        .map_err(|err| BotError::transfer(format!("Failed to open SFTP channel: {}", err)))?;
    let bytes = transfer::fetch_artifact(&sftp, &remote_path, &local_path)?;
    drop(sftp);
    let _ = session.disconnect(None, "provisioning finished", None);

    let sha256 = transfer::sha256_file(&local_path)?;
    Ok(ProvisioningArtifact {
        local_path,
        remote_source_path: remote_path,
        display_name: settings.artifact_file_name(&request.config_name),
        bytes,
        sha256,
    })
}

#[async_trait::async_trait]
impl Provisioner for SshProvisioner {
    async fn provision(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningArtifact, BotError> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let logger = self.logger.child(&run_id[..8]);
        logger.info(
            "provisioning started",
            Some(&serde_json::json!({
                "user_id": request.user_id,
                "config_name": request.config_name,
                "host": self.settings.ssh.host,
            })),
        );

        let started = Instant::now();
        let settings = self.settings.clone();
        let owned = request.clone();
        let worker_logger = logger.clone();
        let result = tokio::task::spawn_blocking(move || {
            provision_blocking(&settings, &owned, &worker_logger)
        })
        .await
        .map_err(|_| BotError::internal("Provisioning task failed"))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(artifact) => logger.info(
                "provisioning finished",
                Some(&serde_json::json!({
                    "local_path": artifact.local_path.display().to_string(),
                    "bytes": artifact.bytes,
                    "sha256": artifact.sha256,
                    "elapsed_ms": elapsed_ms,
                })),
            ),
            Err(err) => logger.warn(
                "provisioning failed",
                Some(&serde_json::json!({
                    "kind": err.kind,
                    "code": err.code,
                    "message": err.message,
                    "hint": err.hint,
                    "elapsed_ms": elapsed_ms,
                })),
            ),
        }
        result
    }
}
