// File: livelist-sync/src/record.rs
// Purpose: Typed backend records with a required identity and an open attribute bag

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SyncError};

/// Stable identity of a record within a collection.
///
/// The backend uses string uids for most resources and integer ids for a
/// few (devices, commission payments); both compare by their text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an identity out of a JSON value (string or integer).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RecordId::from_value(&value)
            .ok_or_else(|| D::Error::custom(format!("expected a string or integer id, got {}", value)))
    }
}

/// Every resource list the dashboard keeps live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Transaction,
    Device,
    SmsLog,
    FcmLog,
    TopUpRequest,
    MomoPayTransaction,
    WaveBusinessTransaction,
    CommissionPayment,
    TransactionLog,
}

impl RecordKind {
    pub const ALL: [RecordKind; 9] = [
        RecordKind::Transaction,
        RecordKind::Device,
        RecordKind::SmsLog,
        RecordKind::FcmLog,
        RecordKind::TopUpRequest,
        RecordKind::MomoPayTransaction,
        RecordKind::WaveBusinessTransaction,
        RecordKind::CommissionPayment,
        RecordKind::TransactionLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transaction => "transactions",
            RecordKind::Device => "devices",
            RecordKind::SmsLog => "sms_logs",
            RecordKind::FcmLog => "fcm_logs",
            RecordKind::TopUpRequest => "topups",
            RecordKind::MomoPayTransaction => "momo_pay",
            RecordKind::WaveBusinessTransaction => "wave_business",
            RecordKind::CommissionPayment => "commission_payments",
            RecordKind::TransactionLog => "transaction_logs",
        }
    }

    /// List endpoint, relative to the API base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            RecordKind::Transaction => "/api/payments/transactions/",
            RecordKind::Device => "/api/payments/stats/devices/",
            RecordKind::SmsLog => "/api/payments/sms-logs/",
            RecordKind::FcmLog => "/api/payments/fcm-logs/",
            RecordKind::TopUpRequest => "/api/payments/recharge-requests/",
            RecordKind::MomoPayTransaction => "/api/payments/momo-pay-transactions/",
            RecordKind::WaveBusinessTransaction => "/api/payments/wave-business-transactions/",
            RecordKind::CommissionPayment => "/api/payments/admin/commission-payments/",
            RecordKind::TransactionLog => "/api/payments/transaction-logs/",
        }
    }

    /// Fields the identity may be read from, in order of preference.
    ///
    /// Push payloads never overwrite these keys.
    pub fn identity_keys(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Device | RecordKind::CommissionPayment => &["id"],
            _ => &["uid", "id"],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| SyncError::Config(format!("unknown resource '{}'", s)))
    }
}

/// A backend entity held in a live list.
///
/// Implementors keep the full JSON object they were built from (identity
/// key included) so that serializing a record gives back what the backend
/// sent, with push patches applied on top.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: RecordKind;

    fn from_parts(id: RecordId, fields: Map<String, Value>) -> Self;

    fn id(&self) -> &RecordId;

    fn fields(&self) -> &Map<String, Value>;

    fn fields_mut(&mut self) -> &mut Map<String, Value>;

    /// Build a record from a JSON object, reading the identity from the
    /// first present key of `KIND.identity_keys()`.
    fn from_value(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(SyncError::Decode(serde_json::Error::custom(format!(
                "{} record must be a JSON object",
                Self::KIND
            ))));
        };

        let id = Self::KIND
            .identity_keys()
            .iter()
            .find_map(|key| fields.get(*key).and_then(RecordId::from_value))
            .ok_or_else(|| {
                SyncError::Decode(serde_json::Error::custom(format!(
                    "{} record has no identity (expected one of {:?})",
                    Self::KIND,
                    Self::KIND.identity_keys()
                )))
            })?;

        Ok(Self::from_parts(id, fields))
    }

    fn to_value(&self) -> Value {
        Value::Object(self.fields().clone())
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.fields().get(field)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Shallow merge: patch values win, identity keys are left alone.
    fn merge(&mut self, patch: &Map<String, Value>) {
        let identity_keys = Self::KIND.identity_keys();
        let fields = self.fields_mut();
        for (key, value) in patch {
            if identity_keys.contains(&key.as_str()) {
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }
    }
}

macro_rules! define_record {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            id: RecordId,
            fields: Map<String, Value>,
        }

        impl Record for $name {
            const KIND: RecordKind = RecordKind::$kind;

            fn from_parts(id: RecordId, fields: Map<String, Value>) -> Self {
                Self { id, fields }
            }

            fn id(&self) -> &RecordId {
                &self.id
            }

            fn fields(&self) -> &Map<String, Value> {
                &self.fields
            }

            fn fields_mut(&mut self) -> &mut Map<String, Value> {
                &mut self.fields
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                self.fields.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let value = Value::deserialize(deserializer)?;
                <$name as Record>::from_value(value).map_err(D::Error::custom)
            }
        }
    };
}

define_record!(
    /// Payment transaction (deposit, withdrawal, transfer)
    Transaction => Transaction
);
define_record!(
    /// Agent phone relaying SMS/USSD for the platform
    Device => Device
);
define_record!(SmsLog => SmsLog);
define_record!(FcmLog => FcmLog);
define_record!(
    /// Balance recharge request awaiting admin approval
    TopUpRequest => TopUpRequest
);
define_record!(MomoPayTransaction => MomoPayTransaction);
define_record!(WaveBusinessTransaction => WaveBusinessTransaction);
define_record!(CommissionPayment => CommissionPayment);
define_record!(TransactionLog => TransactionLog);

impl Transaction {
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// Amount as a number; the API sends decimals either as numbers or strings.
    pub fn amount(&self) -> Option<f64> {
        match self.get("amount")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Transaction type, which older payloads carry as `trans_type`
    pub fn trans_type(&self) -> Option<&str> {
        self.str_field("type").or_else(|| self.str_field("trans_type"))
    }
}

impl Device {
    pub fn is_online(&self) -> bool {
        self.get("is_online").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.str_field("last_seen")
    }
}

impl TopUpRequest {
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_transaction_identity_prefers_uid() {
        let tx: Transaction =
            serde_json::from_value(json!({"id": 42, "uid": "T1", "status": "pending"})).unwrap();
        assert_eq!(tx.id().as_str(), "T1");
        assert_eq!(tx.status(), Some("pending"));
    }

    #[test]
    fn test_transaction_identity_falls_back_to_id() {
        let tx = Transaction::from_value(json!({"id": "T1", "amount": 500})).unwrap();
        assert_eq!(tx.id(), &RecordId::from("T1"));
        assert_eq!(tx.amount(), Some(500.0));
    }

    #[test]
    fn test_device_integer_id() {
        let device = Device::from_value(json!({"id": 7, "is_online": true})).unwrap();
        assert_eq!(device.id().as_str(), "7");
        assert!(device.is_online());
        // Round-trips with the original integer id
        assert_eq!(device.to_value(), json!({"id": 7, "is_online": true}));
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let err = Transaction::from_value(json!({"status": "pending"})).unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
        assert!(Device::from_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_merge_keeps_absent_fields_and_identity() {
        let mut tx = Transaction::from_value(json!({"uid": "A", "amount": 100, "status": "pending"})).unwrap();
        let patch = json!({"uid": "B", "status": "completed"});
        tx.merge(patch.as_object().unwrap());

        assert_eq!(tx.id().as_str(), "A");
        assert_eq!(tx.to_value(), json!({"uid": "A", "amount": 100, "status": "completed"}));
    }

    #[test]
    fn test_amount_from_decimal_string() {
        let tx = Transaction::from_value(json!({"uid": "A", "amount": "1500.50"})).unwrap();
        assert_eq!(tx.amount(), Some(1500.5));
    }

    #[rstest]
    #[case("transactions", RecordKind::Transaction)]
    #[case("devices", RecordKind::Device)]
    #[case("sms-logs", RecordKind::SmsLog)]
    #[case("TOPUPS", RecordKind::TopUpRequest)]
    #[case("wave_business", RecordKind::WaveBusinessTransaction)]
    fn test_kind_from_str(#[case] input: &str, #[case] expected: RecordKind) {
        assert_eq!(input.parse::<RecordKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_kind() {
        assert!("payouts".parse::<RecordKind>().is_err());
    }
}
