use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLI_FACTOR: f64 = 1000.0;

/// Decoded upload container. Consumed once by [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    pub start_timestamp: i64,
    pub entries: Vec<UploadEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub offset_seconds: u32,
    pub reading: RawReading,
}

/// Reading as transmitted: voltages in mV, currents in mA, power in W.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawReading {
    pub battery_voltage_mv: i32,
    pub battery_current_ma: i32,
    pub panel_voltage_mv: i32,
    pub panel_power_w: i32,
    pub load_current_ma: i32,
}

/// Persisted reading in volts, amps and whole watts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub battery_voltage: f64,
    pub battery_current: f64,
    pub panel_voltage: f64,
    pub panel_power: i32,
    pub load_current: f64,
    /// Seconds since the unix epoch.
    pub recorded_at: i64,
}

impl UploadEntry {
    /// The decoder guarantees this does not overflow.
    pub fn absolute_time(&self, start_timestamp: i64) -> i64 {
        start_timestamp + i64::from(self.offset_seconds)
    }
}

impl RawReading {
    pub fn normalize(&self, recorded_at: i64) -> NormalizedReading {
        NormalizedReading {
            battery_voltage: f64::from(self.battery_voltage_mv) / MILLI_FACTOR,
            battery_current: f64::from(self.battery_current_ma) / MILLI_FACTOR,
            panel_voltage: f64::from(self.panel_voltage_mv) / MILLI_FACTOR,
            panel_power: self.panel_power_w,
            load_current: f64::from(self.load_current_ma) / MILLI_FACTOR,
            recorded_at,
        }
    }
}

impl NormalizedReading {
    pub fn recorded_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.recorded_at, 0)
    }
}

/// Converts every entry of `batch` into a [`NormalizedReading`], in order.
pub fn normalize(batch: &UploadBatch) -> Vec<NormalizedReading> {
    batch
        .entries
        .iter()
        .map(|entry| {
            entry
                .reading
                .normalize(entry.absolute_time(batch.start_timestamp))
        })
        .collect()
}
