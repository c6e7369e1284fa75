//! Telemetry Record Codec
//!
//! Encodes one sensor reading per line in a fixed CSV schema:
//! `timestamp,ax,ay,az,gx,gy,gz,tempC,audioRMS`.
//! Also provides the receiving side: line reassembly from fragmented
//! channel bytes and record parsing.

mod assembler;
mod encoder;
mod error;
mod parser;
mod reading;

pub use assembler::{LineAssembler, DEFAULT_MAX_LINE};
pub use encoder::{encode, Record, MAX_RECORD_LEN};
pub use error::CodecError;
pub use parser::parse_record;
pub use reading::{MotionSample, Reading};

/// Column header matching the field order of every record
pub const CSV_HEADER: &str = "timestamp,ax,ay,az,gx,gy,gz,tempC,audioRMS";

/// Number of comma-separated fields in a record
pub const FIELD_COUNT: usize = 9;

/// Audio field value meaning "no full frame this tick"
pub const AUDIO_UNAVAILABLE: f32 = -1.0;

/// Line terminator used on the constrained channel
pub const CONSTRAINED_TERMINATOR: &[u8] = b"\n";

/// Line terminator used on the reliable channel
pub const RELIABLE_TERMINATOR: &[u8] = b"\r\n";
