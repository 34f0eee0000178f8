use crate::models::{ServerDescriptor, ServerStatus};
use crate::services::logger::Logger;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Returns whether `host:port` accepts a TCP connection within `timeout`.
/// Name resolution counts against the same budget. Never fails outward.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[derive(Clone)]
pub struct ServerHealthChecker {
    logger: Logger,
    probe_timeout: Duration,
}

impl ServerHealthChecker {
    pub fn new(logger: Logger, probe_timeout: Duration) -> Self {
        Self {
            logger: logger.child("health"),
            probe_timeout,
        }
    }

    /// Probes every server concurrently; results keep the input order.
    pub async fn check_all(&self, servers: &[ServerDescriptor]) -> Vec<ServerStatus> {
        let started = Instant::now();
        let probes = servers.iter().map(|server| async move {
            let reachable = probe_port(&server.host, server.port, self.probe_timeout).await;
            ServerStatus {
                name: server.name.clone(),
                host: server.host.clone(),
                port: server.port,
                reachable,
            }
        });
        let statuses = futures::future::join_all(probes).await;
        let down = statuses.iter().filter(|s| !s.reachable).count();
        self.logger.info(
            "health check finished",
            Some(&serde_json::json!({
                "servers": statuses.len(),
                "down": down,
                "elapsed_ms": started.elapsed().as_millis() as u64,
            })),
        );
        statuses
    }
}

pub fn render_report(statuses: &[ServerStatus]) -> String {
    statuses
        .iter()
        .map(|status| {
            if status.reachable {
                format!("🟢 {} ({}) — running", status.name, status.port)
            } else {
                format!("🔴 {} ({}) — not running", status.name, status.port)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
