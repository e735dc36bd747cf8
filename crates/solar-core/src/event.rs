use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::wire;

/// Device lifecycle event as decoded from the event endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Seconds since the unix epoch, as reported by the device.
    pub timestamp: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Startup { uptime_seconds: u32 },
    Online { uptime_seconds: u32 },
    Offline { uptime_seconds: u32 },
    /// The oneof was empty or carried a member this server does not know.
    Unspecified,
}

impl From<wire::SystemEvent> for SystemEvent {
    fn from(msg: wire::SystemEvent) -> Self {
        use wire::system_event::Event;

        let kind = match msg.event {
            Some(Event::StartupEvent(e)) => EventKind::Startup {
                uptime_seconds: e.uptime_seconds,
            },
            Some(Event::OnlineEvent(e)) => EventKind::Online {
                uptime_seconds: e.uptime_seconds,
            },
            Some(Event::OfflineEvent(e)) => EventKind::Offline {
                uptime_seconds: e.uptime_seconds,
            },
            None => EventKind::Unspecified,
        };

        Self {
            timestamp: msg.timestamp,
            kind,
        }
    }
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Startup { .. } => "startup",
            Self::Online { .. } => "online",
            Self::Offline { .. } => "offline",
            Self::Unspecified => "unspecified",
        }
    }

    fn to_value(self) -> Value {
        match self {
            Self::Startup { uptime_seconds } => {
                json!({ "startupEvent": { "uptimeSeconds": uptime_seconds } })
            }
            Self::Online { uptime_seconds } => {
                json!({ "onlineEvent": { "uptimeSeconds": uptime_seconds } })
            }
            Self::Offline { uptime_seconds } => {
                json!({ "offlineEvent": { "uptimeSeconds": uptime_seconds } })
            }
            Self::Unspecified => json!({}),
        }
    }
}

impl SystemEvent {
    /// Canonical JSON text of the whole event: camelCase member names,
    /// `timestamp` as a JSON number. Object keys are emitted in sorted
    /// order, so equal events always render to identical strings.
    pub fn render(&self) -> String {
        let mut value = self.kind.to_value();
        if let Value::Object(map) = &mut value {
            map.insert("timestamp".to_string(), Value::from(self.timestamp));
        }
        value.to_string()
    }

    /// Renders once; the record's text is what gets logged and stored.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            timestamp: self.timestamp,
            kind: self.kind,
            text: self.render(),
        }
    }
}

/// A decoded event together with its canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub timestamp: i64,
    pub kind: EventKind,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_stable_key_order() {
        let event = SystemEvent {
            timestamp: 1_764_505_800,
            kind: EventKind::Startup {
                uptime_seconds: 123,
            },
        };

        assert_eq!(
            event.render(),
            r#"{"startupEvent":{"uptimeSeconds":123},"timestamp":1764505800}"#
        );
        assert_eq!(event.render(), event.clone().render());
        assert_eq!(event.to_record().text, event.render());
    }

    #[test]
    fn unspecified_event_renders_timestamp_only() {
        let event = SystemEvent {
            timestamp: 42,
            kind: EventKind::Unspecified,
        };
        assert_eq!(event.render(), r#"{"timestamp":42}"#);
    }

    #[test]
    fn converts_wire_oneof() {
        let msg = wire::SystemEvent {
            timestamp: 7,
            event: Some(wire::system_event::Event::OfflineEvent(
                wire::OfflineEvent { uptime_seconds: 9 },
            )),
        };
        let event = SystemEvent::from(msg);
        assert_eq!(event.kind, EventKind::Offline { uptime_seconds: 9 });
        assert_eq!(event.kind.name(), "offline");
    }
}
