//! Record Parser

use crate::error::CodecError;
use crate::reading::Reading;
use crate::FIELD_COUNT;
use std::str::FromStr;

const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "timestamp", "ax", "ay", "az", "gx", "gy", "gz", "tempC", "audioRMS",
];

fn field<T: FromStr>(fields: &[&str; FIELD_COUNT], idx: usize) -> Result<T, CodecError> {
    fields[idx].parse().map_err(|_| CodecError::InvalidField {
        field: FIELD_NAMES[idx],
        value: fields[idx].to_string(),
    })
}

/// Parse one record line back into a reading.
///
/// Whitespace around fields and a trailing line terminator are tolerated.
/// A negative audio value parses as "unavailable".
pub fn parse_record(line: &str) -> Result<Reading, CodecError> {
    let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');

    let mut fields = [""; FIELD_COUNT];
    let mut found = 0;
    for part in line.split(',') {
        if found < FIELD_COUNT {
            fields[found] = part.trim();
        }
        found += 1;
    }
    if found != FIELD_COUNT {
        return Err(CodecError::FieldCount {
            expected: FIELD_COUNT,
            found,
        });
    }

    let audio: f32 = field(&fields, 8)?;
    Ok(Reading {
        timestamp_ms: field(&fields, 0)?,
        accel: [field(&fields, 1)?, field(&fields, 2)?, field(&fields, 3)?],
        gyro: [field(&fields, 4)?, field(&fields, 5)?, field(&fields, 6)?],
        temperature_c: field(&fields, 7)?,
        audio_rms: (audio >= 0.0).then_some(audio),
    })
}
