//! The pure per-record stages between decode and the aggregation engine.

use crate::core::error::ProjectError;
use crate::core::record::{AggregateState, ConvertedReading, Reading, StationSummary};

pub const TEMPERATURE_THRESHOLD_C: f64 = 30.0;

/// Filter stage: only readings strictly above the Celsius threshold survive.
pub fn accept(reading: &Reading) -> bool {
    reading.temperature_c > TEMPERATURE_THRESHOLD_C
}

/// Transform stage: Celsius to Fahrenheit, humidity untouched.
pub fn convert(reading: Reading) -> ConvertedReading {
    ConvertedReading {
        station: reading.station,
        temperature_f: reading.temperature_c * 9.0 / 5.0 + 32.0,
        humidity: reading.humidity,
    }
}

/// Rekey stage: the aggregation key is the station identity.
pub fn key_of(reading: &ConvertedReading) -> &str {
    &reading.station
}

/// Emission stage: project the running aggregate into a summary. Stateless;
/// fails only when the aggregate has seen no readings.
pub fn project(station: &str, state: &AggregateState) -> Result<StationSummary, ProjectError> {
    if state.count == 0 {
        return Err(ProjectError::EmptyAggregate {
            station: station.to_string(),
        });
    }
    let avg_temp_f = state.sum_temp_f / state.count as f64;
    let avg_humidity_pct = state.sum_humidity / state.count as f64;
    Ok(StationSummary {
        station: station.to_string(),
        avg_temp_f,
        avg_humidity_pct,
        formatted_text: format!(
            "{station} : Average Temperature = {avg_temp_f:.2}°F, Average Humidity = {avg_humidity_pct:.1}%"
        ),
    })
}
