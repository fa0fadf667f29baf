//! Trace loading and cursor errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Out of transactions: started at {started}, ran out at {at}")]
    OutOfTransactions { started: usize, at: usize },

    #[error("Unknown transaction kind: {0}")]
    UnknownTransactionKind(String),

    #[error("Record {record} ({kind}) is missing field '{field}'")]
    MissingField {
        record: usize,
        kind: String,
        field: &'static str,
    },

    #[error("Record {record} has invalid hex payload: {source}")]
    InvalidHex {
        record: usize,
        #[source]
        source: hex::FromHexError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
