//! Loader for `usbrply` JSON captures.
//!
//! The capture is `{"data": [record, ...]}` (a bare array is accepted too).
//! Each record carries a `type` plus the fields for that kind; payloads are
//! hex strings.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::cursor::Trace;
use super::error::TraceError;
use super::model::{BulkTransfer, ControlSetup, ControlTransfer, PacketNumber, Transaction};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaptureDocument {
    Wrapped { data: Vec<RawRecord> },
    Bare(Vec<RawRecord>),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    v: Option<String>,
    #[serde(default, rename = "bRequestType")]
    request_type: Option<u8>,
    #[serde(default, rename = "bRequest")]
    request: Option<u8>,
    #[serde(default, rename = "wValue")]
    value: Option<u16>,
    #[serde(default, rename = "wIndex")]
    index: Option<u16>,
    #[serde(default, rename = "wLength")]
    length: Option<u16>,
    #[serde(default)]
    endp: Option<u8>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    packn: Option<(u32, u32)>,
}

impl RawRecord {
    fn require<T>(&self, record: usize, field: &'static str, v: Option<T>) -> Result<T, TraceError> {
        v.ok_or_else(|| TraceError::MissingField {
            record,
            kind: self.kind.clone(),
            field,
        })
    }

    fn payload(&self, record: usize) -> Result<Vec<u8>, TraceError> {
        match &self.data {
            Some(s) => hex::decode(s.trim()).map_err(|source| TraceError::InvalidHex { record, source }),
            None => Ok(Vec::new()),
        }
    }

    fn sequence(&self) -> PacketNumber {
        self.packn
            .map(|(index, total)| PacketNumber::new(index, total))
            .unwrap_or_default()
    }

    fn control(&self, record: usize) -> Result<ControlTransfer, TraceError> {
        Ok(ControlTransfer {
            setup: ControlSetup {
                request_type: self.require(record, "bRequestType", self.request_type)?,
                request: self.require(record, "bRequest", self.request)?,
                value: self.require(record, "wValue", self.value)?,
                index: self.require(record, "wIndex", self.index)?,
                length: self.require(record, "wLength", self.length)?,
            },
            payload: self.payload(record)?,
            sequence: self.sequence(),
        })
    }

    fn bulk(&self, record: usize) -> Result<BulkTransfer, TraceError> {
        Ok(BulkTransfer {
            endpoint: self.require(record, "endp", self.endp)?,
            payload: self.payload(record)?,
            sequence: self.sequence(),
        })
    }

    fn into_transaction(self, record: usize) -> Result<Transaction, TraceError> {
        match self.kind.as_str() {
            "comment" => {
                let text = self.require(record, "v", self.v.clone())?;
                Ok(Transaction::Comment(text))
            }
            "controlRead" => Ok(Transaction::ControlRead(self.control(record)?)),
            "controlWrite" => Ok(Transaction::ControlWrite(self.control(record)?)),
            "bulkRead" => Ok(Transaction::BulkRead(self.bulk(record)?)),
            "bulkWrite" => Ok(Transaction::BulkWrite(self.bulk(record)?)),
            other => Err(TraceError::UnknownTransactionKind(other.to_string())),
        }
    }
}

/// Parse a capture from JSON text.
pub fn parse_capture(json: &str) -> Result<Trace, TraceError> {
    let records = match serde_json::from_str::<CaptureDocument>(json)? {
        CaptureDocument::Wrapped { data } => data,
        CaptureDocument::Bare(data) => data,
    };
    let transactions = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_transaction(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Trace::new(transactions))
}

/// Read and parse a capture file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_capture<P: AsRef<Path>>(path: P) -> Result<Trace, TraceError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let trace = parse_capture(&content)?;
    debug!(transactions = trace.len(), "Capture loaded");
    Ok(trace)
}
