use crate::constants::limits::TRANSCRIPT_TAIL_BYTES;
use crate::errors::BotError;
use crate::services::config::ReadinessMode;
use crate::utils::redact::redact_text;
use crate::utils::text::{single_line, truncate_utf8_suffix};
use regex::Regex;
use std::io::{self, ErrorKind};
use std::time::{Duration, Instant};

/// Byte-stream view of a running interactive program.
pub trait InteractiveChannel {
    /// Reads available output from either stream. Returns `WouldBlock` when
    /// nothing is pending.
    fn read_output(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_input(&mut self, data: &[u8]) -> io::Result<()>;
    fn close_input(&mut self) -> io::Result<()>;
    fn exited(&self) -> bool;
}

/// The two-line stdin conversation with the certificate issuance program.
pub struct IssuanceScript<'a> {
    pub config_name: &'a str,
    pub passphrase: &'a str,
    pub readiness: ReadinessMode,
    pub name_prompt: &'a str,
    pub passphrase_prompt: &'a str,
    pub settle_delay: Duration,
    pub overall_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Default)]
pub struct Transcript {
    text: String,
    cursor: usize,
}

impl Transcript {
    fn push(&mut self, chunk: &[u8]) {
        self.text.push_str(&String::from_utf8_lossy(chunk));
    }

    /// Looks for `marker` in output received after the previous match and
    /// consumes everything up to and including it.
    fn take_marker(&mut self, marker: &Regex) -> bool {
        match marker.find(&self.text[self.cursor..]) {
            Some(found) => {
                self.cursor += found.end();
                true
            }
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn tail(&self, secrets: &[&str]) -> String {
        let tail = truncate_utf8_suffix(&self.text, TRANSCRIPT_TAIL_BYTES);
        single_line(&redact_text(&tail, secrets))
    }
}

fn marker_pattern(marker: &str) -> Option<Regex> {
    let trimmed = marker.trim();
    if trimmed.is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", regex::escape(trimmed))).ok()
}

struct Driver<'a, C: InteractiveChannel> {
    channel: &'a mut C,
    transcript: Transcript,
    started: Instant,
    deadline: Instant,
    poll_interval: Duration,
    secrets: [&'a str; 1],
}

impl<C: InteractiveChannel> Driver<'_, C> {
    fn pump(&mut self) -> Result<(), BotError> {
        let mut buf = [0u8; 8192];
        loop {
            match self.channel.read_output(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => self.transcript.push(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => {
                    return Err(BotError::connection(format!(
                        "Failed to read remote program output: {}",
                        err
                    )))
                }
            }
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn with_output_hint(&self, err: BotError) -> BotError {
        err.with_hint(format!("Last output: {}", self.transcript.tail(&self.secrets)))
    }

    fn await_marker(&mut self, marker: &Regex, label: &str) -> Result<(), BotError> {
        loop {
            self.pump()?;
            if self.transcript.take_marker(marker) {
                return Ok(());
            }
            if self.channel.exited() {
                self.pump()?;
                if self.transcript.take_marker(marker) {
                    return Ok(());
                }
                let err = BotError::internal(format!(
                    "Remote program exited before asking for the {}",
                    label
                ));
                return Err(self.with_output_hint(err));
            }
            if Instant::now() >= self.deadline {
                let err = BotError::timeout(format!(
                    "Remote program did not ask for the {} within {} ms",
                    label,
                    self.elapsed_ms()
                ));
                return Err(self.with_output_hint(err));
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn settle(&mut self, delay: Duration) -> Result<(), BotError> {
        let until = std::cmp::min(Instant::now() + delay, self.deadline);
        while Instant::now() < until {
            self.pump()?;
            std::thread::sleep(std::cmp::min(
                self.poll_interval,
                until.saturating_duration_since(Instant::now()),
            ));
        }
        self.pump()
    }

    fn write_line(&mut self, line: &str, label: &str) -> Result<(), BotError> {
        let payload = format!("{}\n", line);
        self.channel.write_input(payload.as_bytes()).map_err(|err| {
            BotError::connection(format!(
                "Failed to send the {} to the remote program: {}",
                label, err
            ))
        })
    }

    fn finish(&mut self) -> Result<(), BotError> {
        let _ = self.channel.close_input();
        loop {
            self.pump()?;
            if self.channel.exited() {
                return Ok(());
            }
            if Instant::now() >= self.deadline {
                let err = BotError::timeout(format!(
                    "Remote program did not finish within {} ms",
                    self.elapsed_ms()
                ));
                return Err(self.with_output_hint(err));
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

/// Feeds the configuration name and the CA passphrase to the issuance
/// program, then waits for it to exit. Every wait shares one deadline of
/// `script.overall_timeout`.
pub fn drive_issuance<C: InteractiveChannel>(
    channel: &mut C,
    script: &IssuanceScript<'_>,
) -> Result<Transcript, BotError> {
    let started = Instant::now();
    let mut driver = Driver {
        channel,
        transcript: Transcript::default(),
        started,
        deadline: started + script.overall_timeout,
        poll_interval: script.poll_interval,
        secrets: [script.passphrase],
    };

    let prompt_mode = script.readiness == ReadinessMode::Prompt;
    if prompt_mode {
        if let Some(marker) = marker_pattern(script.name_prompt) {
            driver.await_marker(&marker, "configuration name")?;
        }
    }
    driver.write_line(script.config_name, "configuration name")?;

    match marker_pattern(script.passphrase_prompt).filter(|_| prompt_mode) {
        Some(marker) => driver.await_marker(&marker, "CA passphrase")?,
        None => driver.settle(script.settle_delay)?,
    }
    driver.write_line(script.passphrase, "CA passphrase")?;

    driver.finish()?;
    Ok(driver.transcript)
}
