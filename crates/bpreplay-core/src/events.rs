//! Decode events.
//!
//! Lets front ends follow a decode pass without the session knowing how
//! the information is shown.

use std::fmt;

use crate::trace::{PacketNumber, TransactionKind};

/// How a transaction unit ended up in the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Named device operation.
    Named(&'static str),
    /// Generic `bulk2b` exchange with read-back validation.
    Exchange,
    /// Raw control or bulk call.
    Raw,
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emission::Named(name) => write!(f, "cmd.{}", name),
            Emission::Exchange => write!(f, "bulk2b"),
            Emission::Raw => write!(f, "raw"),
        }
    }
}

/// Events emitted by the decoder session.
#[derive(Debug, Clone)]
pub enum DecodeEvent {
    /// Pass started over a trace of `transactions` entries.
    Started { transactions: usize },
    /// A unit was decoded and committed.
    Unit {
        packet: PacketNumber,
        kind: TransactionKind,
        emission: Emission,
    },
    /// A selected rule failed a strict check; generic emission was used.
    Fallback {
        packet: PacketNumber,
        rule: &'static str,
        reason: String,
    },
    /// A read-only query was left out of the script.
    ReadOnlyOmitted {
        packet: PacketNumber,
        rule: &'static str,
    },
    /// A payload was registered as a new blob.
    BlobDiscovered { hash: String, len: usize },
    /// The startup-terminating command was seen.
    StartupEnd { packet: PacketNumber },
    /// Pass finished.
    Complete { lines: usize, new_blobs: usize },
}

/// Observer trait for receiving decode events.
pub trait DecodeObserver: Send + Sync {
    fn on_event(&self, event: &DecodeEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl DecodeObserver for NullObserver {
    fn on_event(&self, _event: &DecodeEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn on_event(&self, event: &DecodeEvent) {
        match event {
            DecodeEvent::Started { transactions } => {
                tracing::info!(transactions = transactions, "Decoding trace");
            }
            DecodeEvent::Unit {
                packet,
                kind,
                emission,
            } => {
                tracing::debug!(packet = %packet, kind = %kind, emission = %emission, "Unit decoded");
            }
            DecodeEvent::Fallback {
                packet,
                rule,
                reason,
            } => {
                tracing::warn!(packet = %packet, rule = rule, "Falling back to low level command: {}", reason);
            }
            DecodeEvent::ReadOnlyOmitted { packet, rule } => {
                tracing::debug!(packet = %packet, rule = rule, "Omitted read-only query");
            }
            DecodeEvent::BlobDiscovered { hash, len } => {
                tracing::info!(hash = %hash, len = len, "New blob");
            }
            DecodeEvent::StartupEnd { packet } => {
                tracing::info!(packet = %packet, "End of startup");
            }
            DecodeEvent::Complete { lines, new_blobs } => {
                tracing::info!(lines = lines, new_blobs = new_blobs, "Decode complete");
            }
        }
    }
}
