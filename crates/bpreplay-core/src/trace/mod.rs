//! Trace model - captured transactions and the read cursor.

pub mod capture;
pub mod cursor;
pub mod error;
pub mod model;

pub use capture::{load_capture, parse_capture};
pub use cursor::{Trace, TraceCursor};
pub use error::TraceError;
pub use model::{
    BulkTransfer, ControlSetup, ControlTransfer, PacketNumber, Transaction, TransactionKind,
};
