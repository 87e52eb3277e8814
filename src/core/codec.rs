use crate::core::error::DecodeError;
use crate::core::record::{ConvertedReading, RawRecord, Reading};

pub const FIELD_DELIMITER: char = ',';

/// Decode a `station,temperature,humidity` payload.
///
/// Fails on anything that is not exactly three fields with finite numeric
/// temperature and humidity. No side effects.
pub fn decode(raw: &RawRecord) -> Result<Reading, DecodeError> {
    let fields: Vec<&str> = raw.payload.split(FIELD_DELIMITER).collect();
    if fields.len() != 3 {
        return Err(malformed(raw, format!("expected 3 fields, got {}", fields.len())));
    }

    let station = fields[0].trim();
    if station.is_empty() {
        return Err(malformed(raw, "empty station field".to_string()));
    }

    let temperature_c = parse_finite(fields[1])
        .ok_or_else(|| malformed(raw, format!("invalid temperature {:?}", fields[1].trim())))?;
    let humidity = parse_finite(fields[2])
        .ok_or_else(|| malformed(raw, format!("invalid humidity {:?}", fields[2].trim())))?;

    Ok(Reading {
        station: station.to_string(),
        temperature_c,
        humidity,
    })
}

/// Re-serialize a converted reading for intermediate textual hops:
/// `station,temperatureF,humidity`.
pub fn encode(reading: &ConvertedReading) -> String {
    format!(
        "{}{d}{}{d}{}",
        reading.station,
        reading.temperature_f,
        reading.humidity,
        d = FIELD_DELIMITER
    )
}

fn parse_finite(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn malformed(raw: &RawRecord, reason: String) -> DecodeError {
    DecodeError::MalformedPayload {
        payload: raw.payload.clone(),
        reason,
    }
}
