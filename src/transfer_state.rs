//! Transfer identity and progress state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier issued by the transfer engine when it accepts a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id, for engines that do not have their own.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TransferId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A path on a named remote, rendered as `remote:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub remote: String,
    pub path: String,
}

impl Location {
    pub fn new(remote: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            path: path.into(),
        }
    }

    /// Returns this location with `name` appended as a child path segment.
    pub fn join(&self, name: &str) -> Self {
        let path = match self.path.trim_end_matches('/') {
            "" => name.to_string(),
            parent => format!("{}/{}", parent, name),
        };
        Self {
            remote: self.remote.clone(),
            path,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote, self.path)
    }
}

/// Deduplication key for drag-and-drop launches.
///
/// Derived only from the raw source and destination components, so the same
/// pair always yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferKey {
    source: Location,
    destination: Location,
}

impl TransferKey {
    pub fn new(source: Location, destination: Location) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn source(&self) -> &Location {
        &self.source
    }

    pub fn destination(&self) -> &Location {
        &self.destination
    }

    /// The `"<destRemote>:<destPath>"` string used to decorate drop targets.
    pub fn target(&self) -> String {
        self.destination.to_string()
    }
}

impl fmt::Display for TransferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.destination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOperation {
    Sync,
    Copy,
    Move,
    Check,
}

impl TransferOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOperation::Sync => "sync",
            TransferOperation::Copy => "copy",
            TransferOperation::Move => "move",
            TransferOperation::Check => "check",
        }
    }
}

impl fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Running,
    Complete,
    Error,
    Cancelled,
}

impl TransferStatus {
    /// Terminal statuses are absorbing: nothing moves a transfer out of them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Running)
    }
}

/// Most recently known state of one transfer, as delivered by the progress feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSnapshot {
    pub id: TransferId,
    #[serde(rename = "op")]
    pub operation: TransferOperation,
    pub source: String,
    pub destination: String,
    pub percentage: f64,
    pub speed: String,
    pub eta: String,
    pub status: TransferStatus,
}

impl TransferSnapshot {
    pub fn new(
        id: TransferId,
        operation: TransferOperation,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id,
            operation,
            source: source.into(),
            destination: destination.into(),
            percentage: 0.0,
            speed: String::new(),
            eta: String::new(),
            status: TransferStatus::Running,
        }
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = percentage;
        self
    }

    pub fn with_status(mut self, status: TransferStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = TransferKey::new(Location::new("gdrive", "/a"), Location::new("s3", "/b"));
        let b = TransferKey::new(Location::new("gdrive", "/a"), Location::new("s3", "/b"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "gdrive:/a->s3:/b");
        assert_eq!(a.target(), "s3:/b");
    }

    #[test]
    fn test_key_distinguishes_direction() {
        let forward = TransferKey::new(Location::new("gdrive", "/a"), Location::new("s3", "/b"));
        let reverse = TransferKey::new(Location::new("s3", "/b"), Location::new("gdrive", "/a"));
        assert_ne!(forward, reverse);
    }

    #[test]
    fn test_location_join() {
        assert_eq!(Location::new("s3", "").join("a.txt").path, "a.txt");
        assert_eq!(Location::new("s3", "bucket/").join("a.txt").path, "bucket/a.txt");
        assert_eq!(Location::new("s3", "bucket").join("a.txt").to_string(), "s3:bucket/a.txt");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TransferStatus::Running.is_terminal());
        assert!(TransferStatus::Complete.is_terminal());
        assert!(TransferStatus::Error.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = TransferSnapshot::new("t1".into(), TransferOperation::Copy, "gdrive:/a", "s3:/b")
            .with_percentage(40.0);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["op"], "copy");
        assert_eq!(json["status"], "running");

        let parsed: TransferSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
