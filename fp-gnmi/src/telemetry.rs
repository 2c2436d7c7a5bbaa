//! Flattening gNMI notifications into telemetry points.

use chrono::Utc;
use serde::Serialize;

use crate::gnmi::{self, Notification, typed_value::Value};
use crate::path::{join_paths, path_to_string};

/// A single leaf value reported by a target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPoint {
    /// Unix epoch milliseconds reported by the target.
    pub timestamp: i64,

    /// Target name from the configuration.
    pub target: String,

    /// Full path of the leaf, prefix included.
    pub path: String,

    /// Leaf value; `null` for deletions.
    pub value: TelemetryValue,
}

/// Typed leaf value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    /// Decoded `json_val` / `json_ietf_val` payload.
    Json(serde_json::Value),
    List(Vec<TelemetryValue>),
    /// The path was deleted.
    Deleted,
}

impl From<&gnmi::TypedValue> for TelemetryValue {
    fn from(val: &gnmi::TypedValue) -> Self {
        match &val.value {
            Some(Value::StringVal(s)) => TelemetryValue::Text(s.clone()),
            Some(Value::IntVal(i)) => TelemetryValue::Int(*i),
            Some(Value::UintVal(u)) => TelemetryValue::Uint(*u),
            Some(Value::BoolVal(b)) => TelemetryValue::Bool(*b),
            Some(Value::BytesVal(b)) => TelemetryValue::Bytes(b.clone()),
            Some(Value::DoubleVal(d)) => TelemetryValue::Float(*d),
            Some(Value::DecimalVal(d)) => {
                TelemetryValue::Float(d.digits as f64 / 10f64.powi(d.precision as i32))
            }
            Some(Value::LeaflistVal(ll)) => {
                TelemetryValue::List(ll.element.iter().map(TelemetryValue::from).collect())
            }
            Some(Value::JsonVal(j)) | Some(Value::JsonIetfVal(j)) => {
                match serde_json::from_slice(j) {
                    Ok(json) => TelemetryValue::Json(json),
                    Err(_) => TelemetryValue::Text(String::from_utf8_lossy(j).to_string()),
                }
            }
            Some(Value::AsciiVal(a)) => TelemetryValue::Text(a.clone()),
            Some(Value::ProtoBytes(p)) => TelemetryValue::Bytes(p.clone()),
            None => TelemetryValue::Text(String::new()),
        }
    }
}

/// Flatten a notification into one point per update and per deletion.
pub fn points_from_notification(target: &str, notification: &Notification) -> Vec<TelemetryPoint> {
    let timestamp = if notification.timestamp > 0 {
        notification.timestamp / 1_000_000 // Convert nanoseconds to milliseconds
    } else {
        Utc::now().timestamp_millis()
    };
    let prefix = notification.prefix.as_ref();

    let updates = notification.update.iter().filter_map(|update| {
        let path = update.path.as_ref()?;
        let value = update
            .val
            .as_ref()
            .map(TelemetryValue::from)
            .unwrap_or_else(|| TelemetryValue::Text(String::new()));
        Some((path, value))
    });
    let deletes = notification
        .delete
        .iter()
        .map(|path| (path, TelemetryValue::Deleted));

    updates
        .chain(deletes)
        .map(|(path, value)| TelemetryPoint {
            timestamp,
            target: target.to_string(),
            path: path_to_string(&join_paths(prefix, path)),
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnmi::{Decimal64, ScalarArray, TypedValue, Update};
    use crate::path::parse_path;

    fn typed(value: Value) -> TypedValue {
        TypedValue { value: Some(value) }
    }

    #[test]
    fn test_scalar_values() {
        assert_eq!(
            TelemetryValue::from(&typed(Value::UintVal(42))),
            TelemetryValue::Uint(42)
        );
        assert_eq!(
            TelemetryValue::from(&typed(Value::StringVal("UP".to_string()))),
            TelemetryValue::Text("UP".to_string())
        );
        assert_eq!(
            TelemetryValue::from(&typed(Value::DecimalVal(Decimal64 {
                digits: 12345,
                precision: 2,
            }))),
            TelemetryValue::Float(123.45)
        );
    }

    #[test]
    fn test_json_ietf_value() {
        let value = TelemetryValue::from(&typed(Value::JsonIetfVal(
            br#"{"openconfig-interfaces:mtu": 9000}"#.to_vec(),
        )));
        assert_eq!(
            value,
            TelemetryValue::Json(serde_json::json!({"openconfig-interfaces:mtu": 9000}))
        );

        let broken = TelemetryValue::from(&typed(Value::JsonVal(b"not json".to_vec())));
        assert_eq!(broken, TelemetryValue::Text("not json".to_string()));
    }

    #[test]
    fn test_leaf_list() {
        let value = TelemetryValue::from(&typed(Value::LeaflistVal(ScalarArray {
            element: vec![typed(Value::IntVal(1)), typed(Value::BoolVal(true))],
        })));
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            "[1,true]".to_string()
        );
    }

    #[test]
    fn test_points_from_notification() {
        let notification = Notification {
            timestamp: 1_700_000_000_123_000_000,
            prefix: Some(parse_path("/interfaces/interface[name=eth0]").unwrap()),
            update: vec![Update {
                path: Some(parse_path("/state/counters/in-octets").unwrap()),
                val: Some(typed(Value::UintVal(1000))),
                duplicates: 0,
            }],
            delete: vec![parse_path("/state/description").unwrap()],
            atomic: false,
        };

        let points = points_from_notification("dut", &notification);
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].timestamp, 1_700_000_000_123);
        assert_eq!(points[0].target, "dut");
        assert_eq!(
            points[0].path,
            "/interfaces/interface[name=eth0]/state/counters/in-octets"
        );
        assert_eq!(points[0].value, TelemetryValue::Uint(1000));

        assert_eq!(
            points[1].path,
            "/interfaces/interface[name=eth0]/state/description"
        );
        assert_eq!(points[1].value, TelemetryValue::Deleted);

        let json = serde_json::to_value(&points[1]).unwrap();
        assert!(json["value"].is_null());
    }
}
