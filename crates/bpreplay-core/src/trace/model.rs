//! Typed transactions of a captured USB trace.

use std::fmt;

/// Transaction kinds understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Comment,
    ControlRead,
    ControlWrite,
    BulkRead,
    BulkWrite,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Comment => write!(f, "comment"),
            TransactionKind::ControlRead => write!(f, "controlRead"),
            TransactionKind::ControlWrite => write!(f, "controlWrite"),
            TransactionKind::BulkRead => write!(f, "bulkRead"),
            TransactionKind::BulkWrite => write!(f, "bulkWrite"),
        }
    }
}

/// Packet number within the capture, `(n, total)`.
///
/// Only used for labels. Captures exported without packet numbers carry `0/0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketNumber {
    pub index: u32,
    pub total: u32,
}

impl PacketNumber {
    pub const fn new(index: u32, total: u32) -> Self {
        Self { index, total }
    }
}

impl fmt::Display for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}

/// USB control setup fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl ControlSetup {
    pub const fn new(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
            length,
        }
    }
}

/// A control transfer and the bytes that moved in its data stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTransfer {
    pub setup: ControlSetup,
    pub payload: Vec<u8>,
    pub sequence: PacketNumber,
}

/// A bulk transfer on a single endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkTransfer {
    pub endpoint: u8,
    pub payload: Vec<u8>,
    pub sequence: PacketNumber,
}

/// One captured bus event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Comment(String),
    ControlRead(ControlTransfer),
    ControlWrite(ControlTransfer),
    BulkRead(BulkTransfer),
    BulkWrite(BulkTransfer),
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Comment(_) => TransactionKind::Comment,
            Transaction::ControlRead(_) => TransactionKind::ControlRead,
            Transaction::ControlWrite(_) => TransactionKind::ControlWrite,
            Transaction::BulkRead(_) => TransactionKind::BulkRead,
            Transaction::BulkWrite(_) => TransactionKind::BulkWrite,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Transaction::Comment(_))
    }

    /// Bulk read view, if this is one.
    pub fn as_bulk_read(&self) -> Option<&BulkTransfer> {
        match self {
            Transaction::BulkRead(t) => Some(t),
            _ => None,
        }
    }

    /// Packet number, `None` for comments.
    pub fn sequence(&self) -> Option<PacketNumber> {
        match self {
            Transaction::Comment(_) => None,
            Transaction::ControlRead(t) | Transaction::ControlWrite(t) => Some(t.sequence),
            Transaction::BulkRead(t) | Transaction::BulkWrite(t) => Some(t.sequence),
        }
    }
}
