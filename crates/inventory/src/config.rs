//! Reservation tuning knobs.

use std::str::FromStr;
use std::time::Duration;

/// How the debit is written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Version-guarded write committed together with a reservation marker;
    /// the read-check-write cycle restarts on conflict.
    #[default]
    Optimistic,
    /// Plain read followed by a last-write-wins put. Concurrent debits of the
    /// same item can overwrite each other.
    Unconditional,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Optimistic => write!(f, "optimistic"),
            WriteMode::Unconditional => write!(f, "unconditional"),
        }
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(WriteMode::Optimistic),
            "unconditional" => Ok(WriteMode::Unconditional),
            other => Err(format!("unknown write mode '{other}'")),
        }
    }
}

/// Configuration of the reservation activity.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// Pause before reading stock, simulating upstream processing time.
    pub processing_delay: Duration,
    /// Read-check-write cycles attempted before giving up on conflicts.
    pub max_attempts: u32,
    /// Base pause between conflicting cycles; grows linearly per attempt.
    pub retry_backoff: Duration,
    /// How the debit is written.
    pub write_mode: WriteMode,
}

impl ReservationConfig {
    /// Sets the pause before the stock read.
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    /// Sets the number of read-check-write cycles.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base pause between cycles.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the write mode.
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Number of cycles actually attempted (at least one).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            processing_delay: Duration::ZERO,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(10),
            write_mode: WriteMode::Optimistic,
        }
    }
}
