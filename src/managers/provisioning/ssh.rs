use super::driver::{drive_issuance, InteractiveChannel, IssuanceScript, Transcript};
use crate::constants::network::POLL_INTERVAL_MS;
use crate::errors::BotError;
use crate::services::config::{ProvisioningSettings, SshSettings};
use base64::Engine;
use ssh2::{Channel, Session};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

fn map_ssh_error(context: &str, err: ssh2::Error) -> BotError {
    let io_err: io::Error = err.into();
    BotError::connection(format!("{}: {}", context, io_err))
}

fn fingerprint_host_key_sha256(session: &Session) -> Option<String> {
    let hash = session.host_key_hash(ssh2::HashType::Sha256)?;
    let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
    Some(format!("SHA256:{}", encoded))
}

fn open_tcp(ssh: &SshSettings, timeout: Duration) -> Result<TcpStream, BotError> {
    let addrs = (ssh.host.as_str(), ssh.port)
        .to_socket_addrs()
        .map_err(|err| {
            BotError::connection(format!("Failed to resolve SSH host {}: {}", ssh.host, err))
        })?;
    let mut last_err: Option<io::Error> = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(BotError::connection(format!(
        "Failed to connect SSH: {}",
        last_err
            .map(|err| err.to_string())
            .unwrap_or_else(|| format!("no address for {}", ssh.host))
    )))
}

/// Opens and authenticates a fresh session. Sessions are never shared
/// between requests.
pub(super) fn connect_session(ssh: &SshSettings) -> Result<Session, BotError> {
    let timeout = Duration::from_millis(ssh.ready_timeout_ms);
    let tcp = open_tcp(ssh, timeout)?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session =
        Session::new().map_err(|_| BotError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|err| map_ssh_error("SSH handshake failed", err))?;

    if let Some(expected) = ssh.host_key_fingerprint.as_ref() {
        let observed = fingerprint_host_key_sha256(&session);
        if observed.as_ref() != Some(expected) {
            return Err(BotError::connection(format!(
                "SSH host key mismatch (expected {}, got {})",
                expected,
                observed.unwrap_or_else(|| "unknown".to_string())
            )));
        }
    }

    if let Some(key_path) = ssh.private_key_path.as_ref() {
        session
            .userauth_pubkey_file(&ssh.username, None, key_path, None)
            .map_err(|err| map_ssh_error("SSH key authentication failed", err))?;
    } else if let Some(password) = ssh.password.as_ref() {
        session
            .userauth_password(&ssh.username, password.expose())
            .map_err(|err| map_ssh_error("SSH password authentication failed", err))?;
    } else {
        session
            .userauth_agent(&ssh.username)
            .map_err(|err| map_ssh_error("SSH agent authentication failed", err))?;
    }

    if !session.authenticated() {
        return Err(BotError::connection("SSH authentication failed"));
    }
    let interval = std::cmp::max(1, (ssh.keepalive_interval_ms / 1000) as u32);
    session.set_keepalive(true, interval);
    Ok(session)
}

/// Adapts an exec channel on a non-blocking session to [`InteractiveChannel`].
struct RemoteProgram<'a> {
    channel: &'a mut Channel,
    deadline: Instant,
    poll_interval: Duration,
}

impl RemoteProgram<'_> {
    fn wait_or_time_out(&self) -> io::Result<()> {
        if Instant::now() >= self.deadline {
            return Err(io::Error::new(
                ErrorKind::TimedOut,
                "remote program stopped accepting input",
            ));
        }
        std::thread::sleep(self.poll_interval);
        Ok(())
    }
}

impl InteractiveChannel for RemoteProgram<'_> {
    fn read_output(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.channel.read(buf) {
            Ok(n) if n > 0 => return Ok(n),
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(err),
        }
        match self.channel.stderr().read(buf) {
            Ok(n) if n > 0 => Ok(n),
            Ok(_) => Err(io::Error::from(ErrorKind::WouldBlock)),
            Err(err) => Err(err),
        }
    }

    fn write_input(&mut self, data: &[u8]) -> io::Result<()> {
        let mut offset = 0usize;
        while offset < data.len() {
            match self.channel.write(&data[offset..]) {
                Ok(n) if n > 0 => offset += n,
                Ok(_) => self.wait_or_time_out()?,
                Err(err) if err.kind() == ErrorKind::WouldBlock => self.wait_or_time_out()?,
                Err(err) => return Err(err),
            }
        }
        loop {
            match self.channel.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::WouldBlock => self.wait_or_time_out()?,
                Err(err) => return Err(err),
            }
        }
    }

    fn close_input(&mut self) -> io::Result<()> {
        loop {
            match self.channel.send_eof() {
                Ok(()) => return Ok(()),
                Err(err) => {
                    let io_err: io::Error = err.into();
                    if io_err.kind() != ErrorKind::WouldBlock {
                        return Err(io_err);
                    }
                    self.wait_or_time_out()?;
                }
            }
        }
    }

    fn exited(&self) -> bool {
        self.channel.eof()
    }
}

/// Starts the issuance program as one remote command and drives its stdin.
pub(super) fn run_issuance(
    session: &Session,
    settings: &ProvisioningSettings,
    config_name: &str,
) -> Result<Transcript, BotError> {
    let mut channel = session
        .channel_session()
        .map_err(|err| map_ssh_error("Failed to open SSH channel", err))?;
    if settings.request_pty {
        let _ = channel.request_pty("xterm", None, None);
    }
    channel
        .exec(&settings.remote_command)
        .map_err(|err| map_ssh_error("Failed to start remote program", err))?;

    let script = IssuanceScript {
        config_name,
        passphrase: settings.ca_passphrase.expose(),
        readiness: settings.readiness,
        name_prompt: &settings.name_prompt,
        passphrase_prompt: &settings.passphrase_prompt,
        settle_delay: settings.settle_delay,
        overall_timeout: settings.overall_timeout,
        poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
    };

    session.set_blocking(false);
    let outcome = {
        let mut program = RemoteProgram {
            channel: &mut channel,
            deadline: Instant::now() + settings.overall_timeout,
            poll_interval: script.poll_interval,
        };
        drive_issuance(&mut program, &script)
    };
    session.set_blocking(true);

    if outcome.is_ok() {
        let _ = channel.close();
        let _ = channel.wait_close();
    }
    outcome
}
