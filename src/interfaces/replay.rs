use crate::domain::notification::GatewayNotification;
use crate::error::{Result, SettlementError};
use std::io::{BufRead, BufReader, Read};

/// Reads recorded gateway notifications, one JSON object per line.
///
/// Blank lines are skipped. A line that fails to parse yields an error but
/// does not end the stream.
pub struct NotificationReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> NotificationReader<R> {
    /// Creates a new `NotificationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Returns an iterator that lazily reads and deserializes notifications.
    pub fn notifications(self) -> impl Iterator<Item = Result<GatewayNotification>> {
        self.reader
            .lines()
            .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(|line| -> Result<GatewayNotification> {
                let line = line?;
                serde_json::from_str(&line)
                    .map_err(|e| SettlementError::MalformedNotification(e.to_string()))
            })
    }
}
