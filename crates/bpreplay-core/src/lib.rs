//! bpreplay-core: USB capture decoder for BP Microsystems device programmers.
//!
//! Turns a captured trace of control and bulk transfers into a replay
//! script of named programmer commands, deduplicating firmware-sized
//! payloads into a content-addressed blob store.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Trace**: Typed transactions, capture loading and the forward-only cursor
//! - **Protocol**: Wire constants and the reply frame codec
//! - **Reassembly**: Multi-packet bulk replies
//! - **Classify**: Ordered rule tables mapping commands to named operations
//! - **Blob**: Firmware catalogue and per-pass blob store
//! - **Emit**: Script text generation
//! - **Events**: Observer pattern for front ends
//! - **Session**: One decode pass
//! - **Driver**: Device driver boundary exercised by generated scripts
//!
//! # Example
//!
//! ```no_run
//! use bpreplay_core::blob::{BlobStore, Catalogue};
//! use bpreplay_core::session::{DecodeConfig, DecoderSession};
//! use bpreplay_core::trace::load_capture;
//!
//! let trace = load_capture("capture.json").expect("bad capture");
//! let config = DecodeConfig::default();
//! let store = BlobStore::load(Catalogue::new(), config.big_payload_threshold);
//! let decoded = DecoderSession::new(&trace, store, config)
//!     .run()
//!     .expect("decode failed");
//! print!("{}", decoded.script);
//! ```

pub mod blob;
pub mod classify;
pub mod driver;
pub mod emit;
pub mod error;
pub mod events;
pub mod protocol;
pub mod reassembly;
pub mod session;
pub mod trace;

// Re-exports for convenience
pub use blob::{BlobError, BlobStore, Catalogue, LiteralRendering};
pub use classify::{Classification, CommandRule, PatternMismatch};
pub use driver::{DeviceDriver, DeviceImage, DriverError, DriverRegistry, ProgramOptions};
pub use emit::ScriptEmitter;
pub use error::DecodeError;
pub use events::{DecodeEvent, DecodeObserver, NullObserver, TracingObserver};
pub use protocol::{Frame, FrameError};
pub use session::{DecodeConfig, Decoded, DecoderSession};
pub use trace::{Trace, TraceCursor, TraceError, Transaction, load_capture};
