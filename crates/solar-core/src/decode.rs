use chrono::{DateTime, Utc};
use prost::Message;
use thiserror::Error;

use crate::event::SystemEvent;
use crate::reading::{RawReading, UploadBatch, UploadEntry};
use crate::wire;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("entry {index} has no reading")]
    MissingReading { index: usize },
    #[error("entry {index} has negative offset {offset}")]
    NegativeOffset { index: usize, offset: i32 },
    /// `start_timestamp + offset` overflows or falls outside the range
    /// a UTC date can represent.
    #[error("entry {index} timestamp out of range")]
    EntryTimestampOutOfRange { index: usize },
    #[error("event timestamp {0} out of range")]
    EventTimestampOutOfRange(i64),
}

fn representable(timestamp: i64) -> bool {
    DateTime::<Utc>::from_timestamp(timestamp, 0).is_some()
}

/// Decodes a reading upload. Unknown fields are skipped. Every entry's
/// absolute time must be a representable UTC date; the start timestamp of
/// a batch without entries is not checked.
pub fn decode_upload(bytes: &[u8]) -> Result<UploadBatch, DecodeError> {
    let upload = wire::Upload::decode(bytes)?;
    let start_timestamp = upload.start_timestamp;

    let entries = upload
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let offset_seconds = u32::try_from(entry.offset_in_seconds).map_err(|_| {
                DecodeError::NegativeOffset {
                    index,
                    offset: entry.offset_in_seconds,
                }
            })?;
            let in_range = start_timestamp
                .checked_add(i64::from(offset_seconds))
                .is_some_and(representable);
            if !in_range {
                return Err(DecodeError::EntryTimestampOutOfRange { index });
            }
            let reading = entry
                .reading
                .ok_or(DecodeError::MissingReading { index })?;

            Ok(UploadEntry {
                offset_seconds,
                reading: RawReading {
                    battery_voltage_mv: reading.battery_voltage,
                    battery_current_ma: reading.battery_current,
                    panel_voltage_mv: reading.panel_voltage,
                    panel_power_w: reading.panel_power,
                    load_current_ma: reading.load_current,
                },
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UploadBatch {
        start_timestamp,
        entries,
    })
}

/// Decodes a single system event.
pub fn decode_event(bytes: &[u8]) -> Result<SystemEvent, DecodeError> {
    let msg = wire::SystemEvent::decode(bytes)?;
    if !representable(msg.timestamp) {
        return Err(DecodeError::EventTimestampOutOfRange(msg.timestamp));
    }
    Ok(SystemEvent::from(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::reading::normalize;

    fn reading(i: i32) -> wire::Reading {
        wire::Reading {
            battery_voltage: 12_000 + i,
            battery_current: 2_000 + i,
            panel_voltage: 18_000 + i,
            panel_power: 5 + i,
            load_current: 1_000 + i,
        }
    }

    fn upload(start_timestamp: i64, count: i32) -> wire::Upload {
        wire::Upload {
            start_timestamp,
            entries: (0..count)
                .map(|i| wire::UploadEntry {
                    offset_in_seconds: i * 300,
                    reading: Some(reading(i)),
                })
                .collect(),
        }
    }

    #[test]
    fn decodes_full_batch_in_order() {
        let bytes = upload(1_764_505_800, 12).encode_to_vec();

        let batch = decode_upload(&bytes).expect("decode");

        assert_eq!(batch.start_timestamp, 1_764_505_800);
        assert_eq!(batch.entries.len(), 12);
        assert_eq!(batch.entries[0].offset_seconds, 0);
        assert_eq!(batch.entries[1].offset_seconds, 300);
        assert_eq!(batch.entries[11].offset_seconds, 3_300);
        assert_eq!(batch.entries[11].reading.panel_power_w, 16);

        let readings = normalize(&batch);
        assert_eq!(readings.len(), 12);
        assert_eq!(readings[11].recorded_at, 1_764_505_800 + 3_300);
    }

    #[test]
    fn decodes_zero_entry_batch() {
        let bytes = upload(1_700_000_000, 0).encode_to_vec();
        let batch = decode_upload(&bytes).expect("decode");
        assert_eq!(batch.start_timestamp, 1_700_000_000);
        assert!(batch.entries.is_empty());
    }

    #[test]
    fn ignores_unknown_fields() {
        let mut bytes = upload(1_700_000_000, 2).encode_to_vec();
        // field 15, varint 1
        bytes.extend_from_slice(&[0x78, 0x01]);
        // field 16, length-delimited "hi"
        bytes.extend_from_slice(&[0x82, 0x01, 0x02, b'h', b'i']);

        let batch = decode_upload(&bytes).expect("decode");
        assert_eq!(batch.entries.len(), 2);
    }

    #[test]
    fn rejects_truncated_buffer() {
        let bytes = upload(1_700_000_000, 3).encode_to_vec();
        let err = decode_upload(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, DecodeError::Protobuf(_)));
    }

    #[test]
    fn rejects_invalid_varint() {
        let bytes = [0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(decode_upload(&bytes).is_err());
    }

    #[test]
    fn rejects_entry_without_reading() {
        let mut msg = upload(1_700_000_000, 2);
        msg.entries[1].reading = None;

        let err = decode_upload(&msg.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingReading { index: 1 }));
    }

    #[test]
    fn rejects_negative_offset() {
        let mut msg = upload(1_700_000_000, 1);
        msg.entries[0].offset_in_seconds = -5;

        let err = decode_upload(&msg.encode_to_vec()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NegativeOffset {
                index: 0,
                offset: -5
            }
        ));
    }

    #[test]
    fn rejects_overflowing_timestamp() {
        let mut msg = upload(i64::MAX, 2);
        msg.entries[1].offset_in_seconds = 1;

        let err = decode_upload(&msg.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::EntryTimestampOutOfRange { index: 1 }));
    }

    #[test]
    fn rejects_start_beyond_utc_range() {
        let msg = upload(1_000_000_000_000_000, 1);

        let err = decode_upload(&msg.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::EntryTimestampOutOfRange { index: 0 }));
    }

    #[test]
    fn rejects_event_beyond_utc_range() {
        let msg = wire::SystemEvent {
            timestamp: 1_000_000_000_000_000,
            event: Some(wire::system_event::Event::OnlineEvent(
                wire::OnlineEvent { uptime_seconds: 1 },
            )),
        };

        let err = decode_event(&msg.encode_to_vec()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::EventTimestampOutOfRange(1_000_000_000_000_000)
        ));
    }

    #[test]
    fn decodes_event() {
        let msg = wire::SystemEvent {
            timestamp: 1_764_505_800,
            event: Some(wire::system_event::Event::StartupEvent(
                wire::StartupEvent { uptime_seconds: 123 },
            )),
        };

        let event = decode_event(&msg.encode_to_vec()).expect("decode");

        assert_eq!(event.timestamp, 1_764_505_800);
        assert_eq!(event.kind, EventKind::Startup { uptime_seconds: 123 });
        assert_eq!(event.render(), decode_event(&msg.encode_to_vec()).expect("decode").render());
    }

    #[test]
    fn rejects_corrupt_event() {
        // length-delimited field 2 claiming 10 bytes, only 1 present
        let bytes = [0x08, 0x01, 0x12, 0x0a, 0x08];
        assert!(decode_event(&bytes).is_err());
    }
}
