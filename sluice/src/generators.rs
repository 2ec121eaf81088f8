//! Synthetic log records.
use std::{
    ops::RangeInclusive,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::{Rng, seq::IndexedRandom};
use serde::Serialize;

const SERVICES: &[&str] = &["api", "auth", "billing", "checkout", "search", "worker"];
const LEVELS: &[&str] = &["debug", "info", "info", "info", "warn", "error"];
const WORDS: &[&str] = &[
    "request", "handled", "user", "session", "cache", "miss", "timeout", "retry", "order",
    "payment", "accepted", "rejected", "queue", "latency", "upstream", "connection",
];

/// A log line as shipped by an application.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: u64,
    pub service: &'static str,
    pub level: &'static str,
    pub message: String,
    pub trace_id: String,
    pub sequence: u64,
}

pub struct LogRecordGenerator<R> {
    rng: R,
    message_size: RangeInclusive<usize>,
    sequence: u64,
}

impl<R: Rng> LogRecordGenerator<R> {
    /// Creates a generator whose messages are roughly `message_size` bytes long.
    pub fn new(message_size: RangeInclusive<usize>, rng: R) -> Self {
        Self {
            rng,
            message_size,
            sequence: 0,
        }
    }

    pub fn next_record(&mut self) -> LogRecord {
        let sequence = self.sequence;
        self.sequence += 1;

        let target_len = self.rng.random_range(self.message_size.clone());
        let mut message = String::with_capacity(target_len + 16);
        while message.len() < target_len {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(WORDS.choose(&mut self.rng).unwrap_or(&"event"));
        }

        LogRecord {
            timestamp: now_millis(),
            service: SERVICES.choose(&mut self.rng).copied().unwrap_or("api"),
            level: LEVELS.choose(&mut self.rng).copied().unwrap_or("info"),
            message,
            trace_id: format!("{:032x}", self.rng.random::<u128>()),
            sequence,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
