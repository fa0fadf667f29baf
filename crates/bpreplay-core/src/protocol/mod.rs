//! Protocol module - wire constants and bulk-read framing.

pub mod constants;
pub mod frame;

pub use constants::*;
pub use frame::{Frame, FrameError, decode_frame, encode_frame};
