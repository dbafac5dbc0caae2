//! Observable record stream.
//!
//! Each committed ledger operation produces exactly one [`Record`]. Records
//! are appended to the durable log in the same store transaction as the state
//! change they describe, then broadcast to live subscribers.
//!
//! Design principles:
//! - Immutable append-only log (no deletion)
//! - Gap-free sequence numbers starting at 0
//! - Failed operations leave no record

use crate::Principal;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Submitted {
        owner: Principal,
        index: u64,
        target: Principal,
        value: u128,
        payload: Vec<u8>,
    },
    Confirmed {
        owner: Principal,
        index: u64,
    },
    Revoked {
        owner: Principal,
        index: u64,
    },
    Executed {
        owner: Principal,
        index: u64,
    },
    Deposited {
        sender: Principal,
        amount: u128,
        /// Pool balance after the deposit.
        balance: u128,
    },
}

/// Single entry of the record log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the log.
    pub seq: u64,
    /// Unix timestamp (seconds since epoch).
    pub timestamp: u64,
    pub kind: RecordKind,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(seq: u64, kind: RecordKind) -> Self {
        // A clock before the epoch stamps 0 rather than failing the operation.
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            seq,
            timestamp,
            kind,
        }
    }

    /// Proposal index this record refers to, if any.
    pub fn index(&self) -> Option<u64> {
        match &self.kind {
            RecordKind::Submitted { index, .. }
            | RecordKind::Confirmed { index, .. }
            | RecordKind::Revoked { index, .. }
            | RecordKind::Executed { index, .. } => Some(*index),
            RecordKind::Deposited { .. } => None,
        }
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match &self.kind {
            RecordKind::Submitted { .. } => "submit",
            RecordKind::Confirmed { .. } => "confirm",
            RecordKind::Revoked { .. } => "revoke",
            RecordKind::Executed { .. } => "execute",
            RecordKind::Deposited { .. } => "deposit",
        }
    }
}

/// Live stream of records committed after subscription.
///
/// A subscriber that falls behind the broadcast buffer skips the records it
/// missed; the durable log still has them.
pub struct RecordStream {
    inner: BroadcastStream<Record>,
}

impl RecordStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Record>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for RecordStream {
    type Item = Record;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(record))) => return Poll::Ready(Some(record)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(skipped, "record subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn confirmed(seq: u64) -> Record {
        Record::new(
            seq,
            RecordKind::Confirmed {
                owner: Principal::repeat(1),
                index: seq,
            },
        )
    }

    #[test]
    fn test_record_index() {
        assert_eq!(confirmed(3).index(), Some(3));
        let deposit = Record::new(
            0,
            RecordKind::Deposited {
                sender: Principal::repeat(2),
                amount: 5,
                balance: 5,
            },
        );
        assert_eq!(deposit.index(), None);
        assert_eq!(deposit.label(), "deposit");
    }

    #[tokio::test]
    async fn test_stream_receives_records_in_order() {
        let (sender, receiver) = broadcast::channel(16);
        let mut stream = RecordStream::new(receiver);

        for seq in 0..3 {
            sender.send(confirmed(seq)).unwrap();
        }

        for seq in 0..3 {
            let record = stream.next().await.unwrap();
            assert_eq!(record.seq, seq);
        }
    }

    #[tokio::test]
    async fn test_stream_skips_lagged_records() {
        let (sender, receiver) = broadcast::channel(2);
        let mut stream = RecordStream::new(receiver);

        for seq in 0..5 {
            sender.send(confirmed(seq)).unwrap();
        }
        drop(sender);

        let seqs: Vec<u64> = stream.by_ref().map(|r| r.seq).collect().await;
        assert_eq!(seqs, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_stream_closes_when_sender_dropped() {
        let (sender, receiver) = broadcast::channel::<Record>(4);
        let mut stream = RecordStream::new(receiver);
        drop(sender);
        assert!(stream.next().await.is_none());
    }
}
