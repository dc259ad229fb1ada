// File: livelist-sync/src/event.rs
// Purpose: Push event variants delivered by the notification channel and their effects

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::compression::decode_binary_frame;
use crate::error::Result;
use crate::record::{RecordId, RecordKind};

/// Raw frame as received from the push channel, before decoding.
///
/// Frames are shared between every view subscribed to the bus, so the
/// payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl PushFrame {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        PushFrame::Text(text.into())
    }

    pub fn binary(bytes: impl Into<Arc<[u8]>>) -> Self {
        PushFrame::Binary(bytes.into())
    }

    pub fn len(&self) -> usize {
        match self {
            PushFrame::Text(text) => text.len(),
            PushFrame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode into a typed event. Binary frames may be gzip-compressed.
    pub fn decode(&self) -> Result<PushEvent> {
        match self {
            PushFrame::Text(text) => PushEvent::decode(text),
            PushFrame::Binary(bytes) => {
                let text = decode_binary_frame(bytes)?;
                PushEvent::decode(&text)
            }
        }
    }
}

/// Every message the backend pushes, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// Status or field change of one transaction
    TransactionUpdate {
        transaction_uid: RecordId,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        data: Option<Map<String, Value>>,
    },

    /// A transaction was created; only `event == "transaction_created"` carries a record
    NewTransaction {
        #[serde(default)]
        event: Option<String>,
        #[serde(default)]
        transaction_data: Option<Value>,
    },

    /// A relay device went on/offline
    DeviceStatusUpdate {
        device_id: RecordId,
        #[serde(default)]
        is_online: Option<bool>,
        #[serde(default)]
        last_seen: Option<Value>,
    },

    /// Informational platform event, never tied to a list row
    SystemEvent {
        #[serde(default)]
        event: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        event_data: Option<Value>,
    },

    /// Generic field update for any record kind
    Update {
        id: RecordId,
        #[serde(flatten)]
        fields: Map<String, Value>,
    },

    /// Generic creation for any record kind; the payload is the record
    Create {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },

    #[serde(other)]
    Unknown,
}

/// What applying an event means for a list, independent of the list itself
#[derive(Debug, Clone, PartialEq)]
pub enum EventEffect {
    /// Merge `fields` into the record `id`. `kind: None` targets any list.
    Patch {
        kind: Option<RecordKind>,
        id: RecordId,
        fields: Map<String, Value>,
    },
    /// Insert a new record built from `record`
    Create {
        kind: Option<RecordKind>,
        record: Value,
    },
    /// Side-channel only
    Notify(Notification),
    Ignore,
}

impl EventEffect {
    /// Whether a list of `kind` should act on this effect
    pub fn targets(&self, kind: RecordKind) -> bool {
        match self {
            EventEffect::Patch { kind: target, .. } | EventEffect::Create { kind: target, .. } => {
                target.map_or(true, |target| target == kind)
            }
            EventEffect::Notify(_) | EventEffect::Ignore => false,
        }
    }
}

/// A push message meant for the user, not for any list
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub event: String,
    pub message: String,
    pub data: Option<Value>,
    pub received_at: DateTime<Utc>,
}

const TRANSACTION_CREATED: &str = "transaction_created";
const SYSTEM_EVENT_CREATED: &str = "system_event_created";

impl PushEvent {
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Discriminator name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::TransactionUpdate { .. } => "transaction_update",
            PushEvent::NewTransaction { .. } => "new_transaction",
            PushEvent::DeviceStatusUpdate { .. } => "device_status_update",
            PushEvent::SystemEvent { .. } => "system_event",
            PushEvent::Update { .. } => "update",
            PushEvent::Create { .. } => "create",
            PushEvent::Unknown => "unknown",
        }
    }

    pub fn effect(&self) -> EventEffect {
        match self {
            PushEvent::TransactionUpdate {
                transaction_uid,
                status,
                data,
            } => {
                let mut fields = Map::new();
                if let Some(status) = status {
                    fields.insert("status".to_string(), Value::String(status.clone()));
                }
                if let Some(data) = data {
                    fields.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                EventEffect::Patch {
                    kind: Some(RecordKind::Transaction),
                    id: transaction_uid.clone(),
                    fields,
                }
            }
            PushEvent::NewTransaction {
                event,
                transaction_data,
            } => match (event.as_deref(), transaction_data) {
                (Some(TRANSACTION_CREATED), Some(record)) if !record.is_null() => EventEffect::Create {
                    kind: Some(RecordKind::Transaction),
                    record: record.clone(),
                },
                _ => EventEffect::Ignore,
            },
            PushEvent::DeviceStatusUpdate {
                device_id,
                is_online,
                last_seen,
            } => {
                let mut fields = Map::new();
                if let Some(is_online) = is_online {
                    fields.insert("is_online".to_string(), Value::Bool(*is_online));
                }
                if let Some(last_seen) = last_seen {
                    fields.insert("last_seen".to_string(), last_seen.clone());
                }
                EventEffect::Patch {
                    kind: Some(RecordKind::Device),
                    id: device_id.clone(),
                    fields,
                }
            }
            PushEvent::SystemEvent {
                event,
                message,
                event_data,
            } => {
                if event.as_deref() != Some(SYSTEM_EVENT_CREATED) {
                    return EventEffect::Ignore;
                }
                let message = message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .or_else(|| {
                        event_data
                            .as_ref()
                            .and_then(|data| data.get("description"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                EventEffect::Notify(Notification {
                    event: SYSTEM_EVENT_CREATED.to_string(),
                    message,
                    data: event_data.clone(),
                    received_at: Utc::now(),
                })
            }
            PushEvent::Update { id, fields } => EventEffect::Patch {
                kind: None,
                id: id.clone(),
                fields: fields.clone(),
            },
            PushEvent::Create { fields } => EventEffect::Create {
                kind: None,
                record: Value::Object(fields.clone()),
            },
            PushEvent::Unknown => EventEffect::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::compress;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_transaction_update_effect() {
        let event = PushEvent::decode(
            r#"{"type":"transaction_update","transaction_uid":"T1","status":"completed","data":{"fees":25}}"#,
        )
        .unwrap();

        match event.effect() {
            EventEffect::Patch { kind, id, fields } => {
                assert_eq!(kind, Some(RecordKind::Transaction));
                assert_eq!(id.as_str(), "T1");
                assert_eq!(Value::Object(fields), json!({"status": "completed", "fees": 25}));
            }
            other => panic!("unexpected effect: {:?}", other),
        }
    }

    #[test]
    fn test_data_wins_over_status() {
        let event = PushEvent::decode(
            r#"{"type":"transaction_update","transaction_uid":"T1","status":"completed","data":{"status":"success"}}"#,
        )
        .unwrap();
        let EventEffect::Patch { fields, .. } = event.effect() else {
            panic!("expected a patch");
        };
        assert_eq!(fields.get("status"), Some(&json!("success")));
    }

    #[test]
    fn test_new_transaction_requires_created_event() {
        let created = PushEvent::decode(
            r#"{"type":"new_transaction","event":"transaction_created","transaction_data":{"uid":"T2"}}"#,
        )
        .unwrap();
        assert!(matches!(created.effect(), EventEffect::Create { kind: Some(RecordKind::Transaction), .. }));

        let other = PushEvent::decode(r#"{"type":"new_transaction","event":"transaction_queued","transaction_data":{"uid":"T2"}}"#).unwrap();
        assert_eq!(other.effect(), EventEffect::Ignore);

        let empty = PushEvent::decode(r#"{"type":"new_transaction","event":"transaction_created"}"#).unwrap();
        assert_eq!(empty.effect(), EventEffect::Ignore);
    }

    #[test]
    fn test_device_status_update_targets_devices_only() {
        let event = PushEvent::decode(
            r#"{"type":"device_status_update","device_id":12,"is_online":false,"last_seen":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        let effect = event.effect();
        assert!(effect.targets(RecordKind::Device));
        assert!(!effect.targets(RecordKind::Transaction));
    }

    #[test]
    fn test_system_event_falls_back_to_description() {
        let event = PushEvent::decode(
            r#"{"type":"system_event","event":"system_event_created","event_data":{"description":"Balance low on MTN"}}"#,
        )
        .unwrap();
        match event.effect() {
            EventEffect::Notify(notification) => {
                assert_eq!(notification.message, "Balance low on MTN");
                assert_eq!(notification.event, "system_event_created");
            }
            other => panic!("unexpected effect: {:?}", other),
        }
    }

    #[test]
    fn test_generic_update_targets_any_kind() {
        let event = PushEvent::decode(r#"{"type":"update","id":"A","status":"completed"}"#).unwrap();
        let effect = event.effect();
        assert!(effect.targets(RecordKind::Transaction));
        assert!(effect.targets(RecordKind::SmsLog));
        let EventEffect::Patch { fields, .. } = effect else {
            panic!("expected a patch");
        };
        assert_eq!(Value::Object(fields), json!({"status": "completed"}));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let event = PushEvent::decode(r#"{"type":"heartbeat","ts":1}"#).unwrap();
        assert_eq!(event, PushEvent::Unknown);
        assert_eq!(event.effect(), EventEffect::Ignore);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(PushEvent::decode("not json").is_err());
        assert!(PushEvent::decode(r#"{"no_type": true}"#).is_err());
        assert!(PushFrame::binary(vec![0xff, 0xfe, 0x00]).decode().is_err());
    }

    #[test]
    fn test_gzip_binary_frame() {
        let json = r#"{"type":"update","id":"A","status":"failed"}"#;
        let frame = PushFrame::binary(compress(json.as_bytes(), 6).unwrap());
        assert_eq!(frame.decode().unwrap().name(), "update");
    }
}
