//! Data models for pumpwatch-gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Device Registry Models
// ============================================================================

/// A registered pump device
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub location: String,
}

/// Device payload of an `add_device` client message
#[derive(Debug, Deserialize)]
pub struct DeviceUpsert {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

// ============================================================================
// Telemetry Models
// ============================================================================

/// Pump operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpMode {
    Automatic,
    Manual,
}

impl PumpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpMode::Automatic => "automatic",
            PumpMode::Manual => "manual",
        }
    }
}

/// Latest known telemetry values for one device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub water_level: f64,
    pub pump_status: bool,
    pub mode: PumpMode,
    pub alert: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl DeviceSnapshot {
    /// Snapshot with default telemetry values, no error
    pub fn empty(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            water_level: 0.0,
            pump_status: false,
            mode: PumpMode::Automatic,
            alert: None,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    /// Snapshot tagged with a fetch error; telemetry fields are defaults
    pub fn failed(device_id: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(device_id)
        }
    }
}

// ============================================================================
// Command Models
// ============================================================================

/// Validated device command vocabulary
///
/// Construction goes through [`DeviceCommand::validate`], so the RPC
/// dispatcher can only ever be handed a well-formed method/params pair.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetMode(PumpMode),
    SetPumpStatus(bool),
}

impl DeviceCommand {
    /// Validate a raw command name and params value from a client message.
    ///
    /// `setMode` takes exactly `"automatic"` or `"manual"`; `setPumpStatus`
    /// takes a native boolean. Anything else is rejected.
    pub fn validate(command: &str, params: &Value) -> Option<Self> {
        match command {
            "setMode" => match params.as_str() {
                Some("automatic") => Some(DeviceCommand::SetMode(PumpMode::Automatic)),
                Some("manual") => Some(DeviceCommand::SetMode(PumpMode::Manual)),
                _ => None,
            },
            "setPumpStatus" => params.as_bool().map(DeviceCommand::SetPumpStatus),
            _ => None,
        }
    }

    /// RPC method name on the remote platform
    pub fn method(&self) -> &'static str {
        match self {
            DeviceCommand::SetMode(_) => "setMode",
            DeviceCommand::SetPumpStatus(_) => "setPumpStatus",
        }
    }

    /// RPC params object on the remote platform
    pub fn params(&self) -> Value {
        match self {
            DeviceCommand::SetMode(mode) => serde_json::json!({ "mode": mode.as_str() }),
            DeviceCommand::SetPumpStatus(on) => serde_json::json!({ "pumpStatus": on }),
        }
    }
}

// ============================================================================
// WebSocket Protocol Models
// ============================================================================

/// One entry of the broadcast device list: registry fields always present,
/// telemetry fields present iff a cached snapshot exists for the device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "waterLevel", skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f64>,
    #[serde(rename = "pumpStatus", skip_serializing_if = "Option::is_none")]
    pub pump_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PumpMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

/// Server → client messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    AllDevices { data: Vec<DeviceView> },
}

/// Client → server messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    AddDevice {
        device: DeviceUpsert,
    },
    RemoveDevice {
        device_id: String,
    },
    Command {
        device_id: String,
        command: String,
        params: Value,
    },
}

// ============================================================================
// Operator Auth Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_set_mode() {
        assert_eq!(
            DeviceCommand::validate("setMode", &json!("automatic")),
            Some(DeviceCommand::SetMode(PumpMode::Automatic))
        );
        assert_eq!(
            DeviceCommand::validate("setMode", &json!("manual")),
            Some(DeviceCommand::SetMode(PumpMode::Manual))
        );
        // unknown mode string and wrong param type are rejected
        assert_eq!(DeviceCommand::validate("setMode", &json!("eco")), None);
        assert_eq!(DeviceCommand::validate("setMode", &json!(true)), None);
    }

    #[test]
    fn test_validate_set_pump_status() {
        assert_eq!(
            DeviceCommand::validate("setPumpStatus", &json!(true)),
            Some(DeviceCommand::SetPumpStatus(true))
        );
        // string params like "on" are not booleans
        assert_eq!(DeviceCommand::validate("setPumpStatus", &json!("on")), None);
        assert_eq!(DeviceCommand::validate("setPumpStatus", &json!(1)), None);
    }

    #[test]
    fn test_validate_unknown_method() {
        assert_eq!(DeviceCommand::validate("reboot", &json!(null)), None);
    }

    #[test]
    fn test_command_rpc_shape() {
        let cmd = DeviceCommand::SetMode(PumpMode::Manual);
        assert_eq!(cmd.method(), "setMode");
        assert_eq!(cmd.params(), json!({"mode": "manual"}));

        let cmd = DeviceCommand::SetPumpStatus(false);
        assert_eq!(cmd.method(), "setPumpStatus");
        assert_eq!(cmd.params(), json!({"pumpStatus": false}));
    }

    #[test]
    fn test_inbound_message_parsing() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"add_device","device":{"id":"d1","name":"Well"}}"#)
                .unwrap();
        match msg {
            InboundMessage::AddDevice { device } => {
                assert_eq!(device.id, "d1");
                assert_eq!(device.location, "");
            }
            _ => panic!("wrong variant"),
        }

        let msg: InboundMessage = serde_json::from_str(
            r#"{"type":"command","device_id":"d1","command":"setPumpStatus","params":true}"#,
        )
        .unwrap();
        assert!(matches!(msg, InboundMessage::Command { .. }));

        assert!(serde_json::from_str::<InboundMessage>(r#"{"type":"reboot_all"}"#).is_err());
    }

    #[test]
    fn test_device_view_serialization() {
        let view = DeviceView {
            id: "d1".to_string(),
            name: "Well".to_string(),
            location: String::new(),
            water_level: Some(5.0),
            pump_status: Some(true),
            mode: Some(PumpMode::Manual),
            alert: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["waterLevel"], 5.0);
        assert_eq!(json["pumpStatus"], true);
        assert_eq!(json["mode"], "manual");
        assert!(json.get("alert").is_none());

        let bare = DeviceView {
            id: "d2".to_string(),
            name: "Tank".to_string(),
            location: "yard".to_string(),
            water_level: None,
            pump_status: None,
            mode: None,
            alert: None,
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("waterLevel").is_none());
        assert_eq!(json["location"], "yard");
    }
}
