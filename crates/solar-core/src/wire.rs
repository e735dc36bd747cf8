//! Protobuf messages exchanged with the solar monitor firmware.
//!
//! Declared by hand against `prost`; the authoritative schema is
//! `proto/readings.proto`. Tag numbers must stay in sync with it.

use prost::{Message, Oneof};

/// One averaged charge-controller reading in milli-units.
#[derive(Clone, PartialEq, Message)]
pub struct Reading {
    #[prost(int32, tag = "1")]
    pub battery_voltage: i32,
    #[prost(int32, tag = "2")]
    pub battery_current: i32,
    #[prost(int32, tag = "3")]
    pub panel_voltage: i32,
    #[prost(int32, tag = "4")]
    pub panel_power: i32,
    #[prost(int32, tag = "5")]
    pub load_current: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct UploadEntry {
    #[prost(int32, tag = "1")]
    pub offset_in_seconds: i32,
    #[prost(message, optional, tag = "2")]
    pub reading: Option<Reading>,
}

/// A batch of readings sharing one reference timestamp.
#[derive(Clone, PartialEq, Message)]
pub struct Upload {
    #[prost(int64, tag = "1")]
    pub start_timestamp: i64,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<UploadEntry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StartupEvent {
    #[prost(uint32, tag = "1")]
    pub uptime_seconds: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OnlineEvent {
    #[prost(uint32, tag = "1")]
    pub uptime_seconds: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OfflineEvent {
    #[prost(uint32, tag = "1")]
    pub uptime_seconds: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SystemEvent {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(oneof = "system_event::Event", tags = "2, 3, 4")]
    pub event: Option<system_event::Event>,
}

pub mod system_event {
    use super::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Event {
        #[prost(message, tag = "2")]
        StartupEvent(super::StartupEvent),
        #[prost(message, tag = "3")]
        OnlineEvent(super::OnlineEvent),
        #[prost(message, tag = "4")]
        OfflineEvent(super::OfflineEvent),
    }
}
