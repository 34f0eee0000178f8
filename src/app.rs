use crate::errors::BotError;
use crate::managers::dispatcher::Dispatcher;
use crate::managers::health::ServerHealthChecker;
use crate::managers::provisioning::{Provisioner, SshProvisioner};
use crate::managers::sessions::ConversationSessionManager;
use crate::models::ServerDescriptor;
use crate::services::config::{BotConfig, ProvisioningSettings};
use crate::services::delivery::DeliveryGateway;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub servers: Vec<ServerDescriptor>,
    pub sessions: Arc<ConversationSessionManager>,
    pub health: Arc<ServerHealthChecker>,
    pub dispatcher: Dispatcher,
}

impl App {
    fn validate_settings(
        validation: &Validation,
        settings: &ProvisioningSettings,
    ) -> Result<(), BotError> {
        validation.ensure_string(&settings.remote_command, "REMOTE_COMMAND")?;
        validation.ensure_string(&settings.remote_output_dir, "OUTPUT_DIR")?;
        // The extension is appended to user-chosen names, so it must itself be
        // a plain file-name fragment.
        validation
            .ensure_config_name(&settings.artifact_extension)
            .map_err(|err| {
                BotError::invalid_params(format!("ARTIFACT_EXTENSION is invalid: {}", err))
            })?;
        if settings.overall_timeout.is_zero() {
            return Err(BotError::invalid_params(
                "PROVISION_TIMEOUT_MS must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn initialize(
        config: BotConfig,
        logger: Logger,
        delivery: Arc<dyn DeliveryGateway>,
    ) -> Result<Self, BotError> {
        let provisioner: Arc<dyn Provisioner> = Arc::new(SshProvisioner::new(
            logger.clone(),
            config.provisioning.clone(),
        ));
        Self::with_provisioner(config, logger, delivery, provisioner)
    }

    pub fn with_provisioner(
        config: BotConfig,
        logger: Logger,
        delivery: Arc<dyn DeliveryGateway>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Result<Self, BotError> {
        let validation = Validation::new();
        Self::validate_settings(&validation, &config.provisioning)?;

        let sessions = Arc::new(ConversationSessionManager::new(
            logger.clone(),
            validation,
            config.shared_secret.clone(),
            provisioner,
            delivery.clone(),
        ));
        let health = Arc::new(ServerHealthChecker::new(
            logger.clone(),
            config.probe_timeout,
        ));
        let dispatcher = Dispatcher::new(
            logger.clone(),
            sessions.clone(),
            health.clone(),
            config.servers.clone(),
            delivery,
        );

        logger.info(
            "initialized",
            Some(&serde_json::json!({
                "provisioning_host": config.provisioning.ssh.host,
                "readiness": format!("{:?}", config.provisioning.readiness),
                "servers": config.servers.len(),
                "local_download_dir": config.provisioning.local_download_dir.display().to_string(),
            })),
        );

        Ok(Self {
            logger,
            servers: config.servers,
            sessions,
            health,
            dispatcher,
        })
    }
}
