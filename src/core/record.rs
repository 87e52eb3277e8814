use serde::{Deserialize, Serialize};

/// Opaque input unit pulled from the bus. The payload carries the textual
/// `station,temperature,humidity` form; the key is whatever the upstream
/// partitioner used.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub key: String,
    pub payload: String,
}

impl RawRecord {
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

/// Decoded sensor observation. Temperature is Celsius; both numeric fields
/// are finite (the codec rejects anything else).
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub station: String,
    pub temperature_c: f64,
    pub humidity: f64,
}

/// Reading after unit conversion; same station identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedReading {
    pub station: String,
    pub temperature_f: f64,
    pub humidity: f64,
}

/// Running per-station accumulator. Owned exclusively by the aggregation
/// engine's state store; mutated by exactly one reading's contribution per
/// `apply` call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateState {
    pub sum_temp_f: f64,
    pub sum_humidity: f64,
    pub count: i64,
}

impl AggregateState {
    pub fn apply(&mut self, reading: &ConvertedReading) {
        self.sum_temp_f += reading.temperature_f;
        self.sum_humidity += reading.humidity;
        self.count += 1;
    }
}

/// Projection of an `AggregateState`, recomputed on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub station: String,
    pub avg_temp_f: f64,
    pub avg_humidity_pct: f64,
    pub formatted_text: String,
}
