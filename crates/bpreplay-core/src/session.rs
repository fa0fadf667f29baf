//! Decoder session - one pass from trace to replay script.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::blob::{BlobStore, LiteralRendering};
use crate::classify::{
    Action, Arg, Classification, CommandRule, PatternMismatch, classify_exchange, classify_write,
};
use crate::emit::ScriptEmitter;
use crate::error::DecodeError;
use crate::events::{DecodeEvent, DecodeObserver, Emission, TracingObserver};
use crate::protocol::constants::{COMMAND_ENDPOINT, REPLY_ENDPOINT, STARTUP_END_CMD, STATUS_PROBE};
use crate::reassembly::{LogicalResponse, decode_reply, reassemble_bulk_response};
use crate::trace::{BulkTransfer, ControlTransfer, Trace, TraceCursor, Transaction};

/// Decoder options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Leave status/info queries out of the script.
    pub omit_read_only: bool,
    /// Minimum size for registering a payload as a new blob; 0 disables.
    pub big_payload_threshold: usize,
    /// Raw emission only: no lookahead, no classification.
    pub dumb_mode: bool,
    /// Save blobs discovered in this pass under `blob_dir`.
    pub persist_new_blobs: bool,
    pub blob_dir: Option<PathBuf>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            omit_read_only: true,
            big_payload_threshold: 256,
            dumb_mode: false,
            persist_new_blobs: false,
            blob_dir: None,
        }
    }
}

impl DecodeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DecodeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub script: String,
    /// Blobs first seen in this pass, sorted by hash.
    pub new_blobs: Vec<(String, Vec<u8>)>,
    /// Files written when persisting new blobs.
    pub saved: Vec<PathBuf>,
}

/// Decoder session - owns the cursor, blob store and emitter of one pass.
pub struct DecoderSession<'t, O: DecodeObserver> {
    trace: &'t Trace,
    cursor: TraceCursor<'t>,
    store: BlobStore,
    emitter: ScriptEmitter,
    config: DecodeConfig,
    observer: Arc<O>,
}

impl<'t> DecoderSession<'t, TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(trace: &'t Trace, store: BlobStore, config: DecodeConfig) -> Self {
        Self::with_observer(trace, store, config, Arc::new(TracingObserver))
    }
}

impl<'t, O: DecodeObserver> DecoderSession<'t, O> {
    /// Create a new session with a custom observer.
    ///
    /// The store's blob threshold is replaced by the configured one.
    pub fn with_observer(
        trace: &'t Trace,
        mut store: BlobStore,
        config: DecodeConfig,
        observer: Arc<O>,
    ) -> Self {
        store.set_threshold(config.big_payload_threshold);
        Self {
            trace,
            cursor: trace.cursor(),
            store,
            emitter: ScriptEmitter::new(),
            config,
            observer,
        }
    }

    /// Decode the whole trace.
    ///
    /// Nothing is returned unless every transaction decodes; a fatal error
    /// drops the partial script.
    #[instrument(level = "info", skip(self), fields(transactions = self.trace.len()))]
    pub fn run(mut self) -> Result<Decoded, DecodeError> {
        self.observer.on_event(&DecodeEvent::Started {
            transactions: self.trace.len(),
        });

        self.emitter.prologue();
        while let Some(txn) = self.cursor.step() {
            self.decode_unit(txn)?;
        }
        self.emitter.flush();
        self.emitter.dedent();
        self.emitter.epilogue();

        for _ in 0..3 {
            self.emitter.emit("");
        }
        for line in self.store.summary_lines() {
            self.emitter.emit(line);
        }
        self.emitter.flush();

        let saved = match (&self.config.blob_dir, self.config.persist_new_blobs) {
            (Some(dir), true) => self.store.persist_new(dir)?,
            (None, true) => {
                warn!("No blob directory configured, new blobs not saved");
                Vec::new()
            }
            _ => Vec::new(),
        };
        let new_blobs = self.store.drain_new();
        let script = self.emitter.finish();

        self.observer.on_event(&DecodeEvent::Complete {
            lines: script.lines().count(),
            new_blobs: new_blobs.len(),
        });
        Ok(Decoded {
            script,
            new_blobs,
            saved,
        })
    }

    fn decode_unit(&mut self, txn: &'t Transaction) -> Result<(), DecodeError> {
        let emission = match txn {
            Transaction::Comment(text) => {
                self.emitter.emit_comment(text);
                return Ok(());
            }
            Transaction::ControlRead(t) => self.control_read(t)?,
            Transaction::ControlWrite(t) => self.control_write(t)?,
            Transaction::BulkRead(t) => self.bulk_read(t)?,
            Transaction::BulkWrite(t) => self.bulk_write(t)?,
        };

        for text in self.cursor.take_skipped() {
            self.emitter.emit_comment(text);
        }

        match emission {
            Some(emission) => {
                self.emitter.flush();
                self.observer.on_event(&DecodeEvent::Unit {
                    packet: txn.sequence().unwrap_or_default(),
                    kind: txn.kind(),
                    emission,
                });
            }
            None => {
                self.emitter.discard();
            }
        }
        Ok(())
    }

    fn control_read(&mut self, t: &ControlTransfer) -> Result<Option<Emission>, DecodeError> {
        if !self.config.dumb_mode && t.setup == STATUS_PROBE {
            if let Ok(Transaction::BulkRead(_)) = self.cursor.peek_next() {
                if let Transaction::BulkRead(read) = self.cursor.advance_next()? {
                    decode_reply(read)?;
                }
                self.emitter.emit("cmd.readB0(dev)");
                return Ok(Some(Emission::Named("readB0")));
            }
        }

        let s = &t.setup;
        self.emitter.emit(format!(
            "buff = controlRead(0x{:02X}, 0x{:02X}, 0x{:04X}, 0x{:04X}, {})",
            s.request_type, s.request, s.value, s.index, s.length
        ));
        let data = self.payload(&t.payload)?;
        self.emitter.emit(format!(
            "validate_read({}, buff, \"packet {}\")",
            data, t.sequence
        ));
        Ok(Some(Emission::Raw))
    }

    fn control_write(&mut self, t: &ControlTransfer) -> Result<Option<Emission>, DecodeError> {
        let s = &t.setup;
        let data = self.payload(&t.payload)?;
        self.emitter.emit(format!(
            "buff = controlWrite(0x{:02X}, 0x{:02X}, 0x{:04X}, 0x{:04X}, {})",
            s.request_type, s.request, s.value, s.index, data
        ));
        Ok(Some(Emission::Raw))
    }

    fn bulk_read(&mut self, t: &BulkTransfer) -> Result<Option<Emission>, DecodeError> {
        if t.endpoint != REPLY_ENDPOINT {
            return Err(DecodeError::UnexpectedEndpoint {
                packet: t.sequence,
                expected: REPLY_ENDPOINT,
                actual: t.endpoint,
            });
        }
        let frame = decode_reply(t)?;
        self.emitter
            .emit("_prefix, buff, _size = cmd.bulk86_next_read(dev)");
        let body = self.payload(&frame.body)?;
        self.emitter.emit(format!(
            "validate_read({}, buff, \"packet {}\")",
            body, t.sequence
        ));
        Ok(Some(Emission::Raw))
    }

    fn bulk_write(&mut self, t: &BulkTransfer) -> Result<Option<Emission>, DecodeError> {
        if t.endpoint != COMMAND_ENDPOINT || self.config.dumb_mode {
            return self.raw_bulk_write(t);
        }
        match self.cursor.peek_next() {
            Ok(Transaction::BulkRead(_)) => self.exchange(t),
            _ => self.write_only(t),
        }
    }

    fn raw_bulk_write(&mut self, t: &BulkTransfer) -> Result<Option<Emission>, DecodeError> {
        let data = self.payload(&t.payload)?;
        self.emitter
            .emit(format!("bulkWrite(0x{:02X}, {})", t.endpoint, data));
        Ok(Some(Emission::Raw))
    }

    fn write_only(&mut self, t: &BulkTransfer) -> Result<Option<Emission>, DecodeError> {
        match classify_write(&t.payload) {
            Classification::Matched { rule, args } => {
                self.named_call(rule, &args)?;
                debug!(packet = %t.sequence, rule = rule.name, "Classified write");
                Ok(Some(Emission::Named(rule.name)))
            }
            Classification::Mismatch { rule, fault } => {
                self.annotate_fallback(t, rule, &fault);
                self.raw_bulk_write(t)
            }
            Classification::Delegated { note, .. } => {
                self.emitter
                    .emit(format!("# {}, falling back to low level command", note));
                self.raw_bulk_write(t)
            }
            Classification::NoMatch => self.raw_bulk_write(t),
        }
    }

    fn exchange(&mut self, write: &BulkTransfer) -> Result<Option<Emission>, DecodeError> {
        let response = reassemble_bulk_response(&mut self.cursor, None, write.sequence)?;
        self.emitter.emit(format!(
            "# bulk2 aggregate: packet W: {}, {} to R {}",
            write.sequence,
            response.len(),
            response.last_packet().unwrap_or_default()
        ));

        match classify_exchange(&write.payload, &response.bytes) {
            Classification::Matched { rule, args } => {
                if self.omits(write, rule) {
                    return Ok(None);
                }
                self.named_call(rule, &args)?;
                if rule.action == Action::CallBindReply {
                    let reply = self.store.render_argument(&response.bytes)?;
                    self.emitter.emit(format!("buff = {}", reply));
                }
                debug!(packet = %write.sequence, rule = rule.name, "Classified exchange");
                Ok(Some(Emission::Named(rule.name)))
            }
            Classification::Delegated { rule, note } => {
                if self.omits(write, rule) {
                    return Ok(None);
                }
                self.emitter
                    .emit(format!("# {}, falling back to low level command", note));
                self.generic_exchange(write, &response)
            }
            Classification::Mismatch { rule, fault } => {
                self.annotate_fallback(write, rule, &fault);
                self.generic_exchange(write, &response)
            }
            Classification::NoMatch => self.generic_exchange(write, &response),
        }
    }

    fn generic_exchange(
        &mut self,
        write: &BulkTransfer,
        response: &LogicalResponse,
    ) -> Result<Option<Emission>, DecodeError> {
        let cmd = self.payload(&write.payload)?;
        self.emitter.emit(format!("buff = cmd.bulk2b(dev, {})", cmd));
        let reply = self.payload(&response.bytes)?;
        self.emitter.emit(format!(
            "validate_read({}, buff, \"packet W: {}, R {} to {}\")",
            reply,
            write.sequence,
            response.len(),
            response.last_packet().unwrap_or_default()
        ));

        if write.payload == STARTUP_END_CMD {
            for line in ["", "", "", "# END OF STARTUP", "", "", ""] {
                self.emitter.emit(line);
            }
            self.observer.on_event(&DecodeEvent::StartupEnd {
                packet: write.sequence,
            });
        }
        Ok(Some(Emission::Exchange))
    }

    fn omits(&self, write: &BulkTransfer, rule: &CommandRule) -> bool {
        if !(rule.read_only && self.config.omit_read_only) {
            return false;
        }
        self.observer.on_event(&DecodeEvent::ReadOnlyOmitted {
            packet: write.sequence,
            rule: rule.name,
        });
        true
    }

    fn annotate_fallback(&mut self, t: &BulkTransfer, rule: &CommandRule, fault: &PatternMismatch) {
        self.emitter
            .emit(format!("# {}, falling back to low level command", fault));
        self.observer.on_event(&DecodeEvent::Fallback {
            packet: t.sequence,
            rule: rule.name,
            reason: fault.to_string(),
        });
    }

    fn named_call(&mut self, rule: &CommandRule, args: &[Arg]) -> Result<(), DecodeError> {
        let rendered = args
            .iter()
            .map(|arg| self.render_arg(arg))
            .collect::<Result<Vec<_>, _>>()?;
        self.emitter.emit(rule.call_line(&rendered));
        Ok(())
    }

    fn render_arg(&mut self, arg: &Arg) -> Result<String, DecodeError> {
        Ok(match arg {
            Arg::Bytes(bytes) => self.store.render_argument(bytes)?.to_string(),
            Arg::Name(name) => format!("\"{}\"", name),
            Arg::Byte(b) => format!("0x{:02X}", b),
        })
    }

    /// Render a payload through the blob store, announcing new blobs.
    fn payload(&mut self, data: &[u8]) -> Result<LiteralRendering, DecodeError> {
        let before = self.store.new_len();
        let rendering = self.store.classify_payload(data)?;
        if self.store.new_len() > before {
            if let LiteralRendering::Blob(hash) = &rendering {
                self.observer.on_event(&DecodeEvent::BlobDiscovered {
                    hash: hash.clone(),
                    len: data.len(),
                });
            }
        }
        Ok(rendering)
    }
}
