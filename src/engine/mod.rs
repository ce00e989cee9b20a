//! Audio Engine Module
//!
//! Buffer type and the byte-level boundaries around it:
//! - PCM buffer and level helpers
//! - Canonical PCM16 WAV encoder
//! - WAV decoding for the CLI
//! - Deterministic test signals

pub mod buffer;
pub mod io;
pub mod signals;
pub mod wav;

pub use buffer::{db_to_linear, linear_to_db, PcmBuffer};
pub use io::{read_wav, read_wav_from, write_wav};
pub use wav::{encode, WavContainer, WAV_HEADER_LEN};
