//! Progress feed plumbing between the engine and the registry.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::transfer_state::{TransferId, TransferOperation, TransferSnapshot, TransferStatus};

const KIB: f64 = 1024.0;
const MIB: f64 = 1_048_576.0;
const GIB: f64 = 1_073_741_824.0;

/// Creates the bounded queue whose single reader is the registry's ingest loop.
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<TransferSnapshot>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender { tx }, rx)
}

/// Producer side of the progress feed, handed to engine adapters.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<TransferSnapshot>,
}

impl ProgressSender {
    /// Queues a snapshot. Returns `false` once the registry side has gone away.
    pub async fn send(&self, snapshot: TransferSnapshot) -> bool {
        self.tx.send(snapshot).await.is_ok()
    }

    /// Forwards `stream` into the feed until it ends or the registry goes away.
    /// Returns the number of snapshots forwarded. A reconnecting feed calls
    /// this again with its new stream.
    pub async fn pump<S>(&self, stream: S) -> usize
    where
        S: Stream<Item = TransferSnapshot> + Send,
    {
        let mut stream = std::pin::pin!(stream);
        let mut forwarded = 0;
        while let Some(snapshot) = stream.next().await {
            if !self.send(snapshot).await {
                debug!(forwarded, "Registry closed; stopping progress pump");
                break;
            }
            forwarded += 1;
        }
        forwarded
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Raw byte counters as an engine reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTick {
    pub bytes: u64,
    pub total_bytes: u64,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<f64>,
}

impl ProgressTick {
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.bytes as f64 / self.total_bytes as f64 * 100.0
    }

    /// Builds the display snapshot for this tick.
    pub fn into_snapshot(
        self,
        id: TransferId,
        operation: TransferOperation,
        source: impl Into<String>,
        destination: impl Into<String>,
        status: TransferStatus,
    ) -> TransferSnapshot {
        let mut snapshot = TransferSnapshot::new(id, operation, source, destination)
            .with_percentage(self.percentage())
            .with_status(status);
        snapshot.speed = self.speed_bytes_per_sec.map(format_speed).unwrap_or_default();
        snapshot.eta = self
            .eta_seconds
            .map(format_eta)
            .unwrap_or_else(|| "-".to_string());
        snapshot
    }
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= GIB {
        format!("{:.2} GiB/s", bytes_per_sec / GIB)
    } else if bytes_per_sec >= MIB {
        format!("{:.2} MiB/s", bytes_per_sec / MIB)
    } else if bytes_per_sec >= KIB {
        format!("{:.2} KiB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.0} B/s", bytes_per_sec)
    }
}

pub fn format_eta(seconds: f64) -> String {
    let s = seconds.max(0.0) as u64;
    if s >= 3600 {
        format!("{}h {:02}m {:02}s", s / 3600, (s % 3600) / 60, s % 60)
    } else if s >= 60 {
        format!("{}m {:02}s", s / 60, s % 60)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_speed_units() {
        assert_eq!(format_speed(512.0), "512 B/s");
        assert_eq!(format_speed(2048.0), "2.00 KiB/s");
        assert_eq!(format_speed(5.5 * MIB), "5.50 MiB/s");
        assert_eq!(format_speed(GIB), "1.00 GiB/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(42.9), "42s");
        assert_eq!(format_eta(125.0), "2m 05s");
        assert_eq!(format_eta(3723.0), "1h 02m 03s");
        assert_eq!(format_eta(-3.0), "0s");
    }

    #[test]
    fn test_tick_into_snapshot() {
        let tick = ProgressTick {
            bytes: 256,
            total_bytes: 1024,
            speed_bytes_per_sec: Some(2048.0),
            eta_seconds: None,
        };
        let snapshot = tick.into_snapshot(
            "t1".into(),
            TransferOperation::Sync,
            "gdrive:/a",
            "s3:/b",
            TransferStatus::Running,
        );
        assert_eq!(snapshot.percentage, 25.0);
        assert_eq!(snapshot.speed, "2.00 KiB/s");
        assert_eq!(snapshot.eta, "-");
    }

    #[test]
    fn test_empty_total_is_zero_percent() {
        let tick = ProgressTick {
            bytes: 10,
            total_bytes: 0,
            speed_bytes_per_sec: None,
            eta_seconds: None,
        };
        assert_eq!(tick.percentage(), 0.0);
    }

    #[tokio::test]
    async fn test_pump_forwards_until_stream_ends() {
        let (sender, mut rx) = progress_channel(8);
        let snapshots = (0..3).map(|i| {
            TransferSnapshot::new(format!("t{}", i).into(), TransferOperation::Copy, "a:", "b:")
        });

        let forwarded = sender.pump(futures::stream::iter(snapshots)).await;
        assert_eq!(forwarded, 3);
        drop(sender);

        let mut received = Vec::new();
        while let Some(snapshot) = rx.recv().await {
            received.push(snapshot.id.to_string());
        }
        assert_eq!(received, vec!["t0", "t1", "t2"]);
    }

    #[tokio::test]
    async fn test_pump_stops_when_registry_gone() {
        let (sender, rx) = progress_channel(1);
        drop(rx);
        assert!(sender.is_closed());
        let stream = futures::stream::iter(vec![TransferSnapshot::new(
            "t1".into(),
            TransferOperation::Copy,
            "a:",
            "b:",
        )]);
        assert_eq!(sender.pump(stream).await, 0);
    }
}
