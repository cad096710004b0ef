//! Domain values exchanged with the service.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What to submit: an image on disk or an image the service can fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaSource {
    File(PathBuf),
    Url(String),
}

impl From<PathBuf> for CaptchaSource {
    fn from(path: PathBuf) -> Self {
        CaptchaSource::File(path)
    }
}

/// Server-assigned identifier of a submitted or enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(String);

impl Ticket {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric id, if the ticket is a positive integer.
    pub fn id(&self) -> Option<u64> {
        self.0.trim().parse().ok().filter(|id| *id > 0)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Solver queue snapshot from `get_wait_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Users ahead of the caller.
    pub position: i64,
    /// Total queue length.
    pub length: i64,
    /// Estimated wait in seconds.
    pub eta: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_id_requires_positive_integer() {
        assert_eq!(Ticket::new("55").id(), Some(55));
        assert_eq!(Ticket::new("0").id(), None);
        assert_eq!(Ticket::new("-1").id(), None);
        assert_eq!(Ticket::new("abc").id(), None);
        assert_eq!(Ticket::new("").id(), None);
    }

    #[test]
    fn queue_status_serializes_field_names() {
        let json = serde_json::to_value(QueueStatus { position: 2, length: 10, eta: 30 }).unwrap();
        assert_eq!(json["position"], 2);
        assert_eq!(json["length"], 10);
        assert_eq!(json["eta"], 30);
    }
}
