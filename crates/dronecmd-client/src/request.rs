//! Backend operations and the requests that carry them.

use dronecmd_core::{HttpMethod, TaxonomyError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::Duration;

/// One backend operation. Each maps to exactly one HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    Disconnect,
    Takeoff,
    Land,
    Move,
    Rotate,
    EmergencyStop,
    TakePhoto,
    DetectObjects,
    StartTracking,
    StopTracking,
    ListDatasets,
    CreateDataset,
    ListModels,
    TrainModel,
    SystemHealth,
    SystemStatus,
}

impl Operation {
    pub const ALL: [Operation; 17] = [
        Operation::Connect,
        Operation::Disconnect,
        Operation::Takeoff,
        Operation::Land,
        Operation::Move,
        Operation::Rotate,
        Operation::EmergencyStop,
        Operation::TakePhoto,
        Operation::DetectObjects,
        Operation::StartTracking,
        Operation::StopTracking,
        Operation::ListDatasets,
        Operation::CreateDataset,
        Operation::ListModels,
        Operation::TrainModel,
        Operation::SystemHealth,
        Operation::SystemStatus,
    ];

    pub fn endpoint(self) -> &'static str {
        match self {
            Operation::Connect => "/api/drone/connect",
            Operation::Disconnect => "/api/drone/disconnect",
            Operation::Takeoff => "/api/drone/takeoff",
            Operation::Land => "/api/drone/land",
            Operation::Move => "/api/drone/move",
            Operation::Rotate => "/api/drone/rotate",
            Operation::EmergencyStop => "/api/drone/emergency",
            Operation::TakePhoto => "/api/camera/photo",
            Operation::DetectObjects => "/api/vision/detect",
            Operation::StartTracking => "/api/vision/tracking/start",
            Operation::StopTracking => "/api/vision/tracking/stop",
            Operation::ListDatasets | Operation::CreateDataset => "/api/datasets",
            Operation::ListModels => "/api/models",
            Operation::TrainModel => "/api/models/train",
            Operation::SystemHealth => "/api/system/health",
            Operation::SystemStatus => "/api/system/status",
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            Operation::ListDatasets
            | Operation::ListModels
            | Operation::SystemHealth
            | Operation::SystemStatus => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Action name used by intents
    pub fn name(self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Takeoff => "takeoff",
            Operation::Land => "land",
            Operation::Move => "move",
            Operation::Rotate => "rotate",
            Operation::EmergencyStop => "emergency_stop",
            Operation::TakePhoto => "take_photo",
            Operation::DetectObjects => "detect_objects",
            Operation::StartTracking => "start_tracking",
            Operation::StopTracking => "stop_tracking",
            Operation::ListDatasets => "list_datasets",
            Operation::CreateDataset => "create_dataset",
            Operation::ListModels => "list_models",
            Operation::TrainModel => "train_model",
            Operation::SystemHealth => "system_health",
            Operation::SystemStatus => "system_status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully built backend call
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub operation: Operation,
    /// JSON body for POST calls
    pub body: Option<Value>,
}

impl BackendRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            body: None,
        }
    }

    /// Build from intent parameters; only the keys the operation accepts
    /// are forwarded.
    pub fn from_parameters(operation: Operation, parameters: &Map<String, Value>) -> Self {
        let keys: &[&str] = match operation {
            Operation::Move => &["droneId", "direction", "distance", "speed"],
            Operation::Rotate => &["droneId", "direction", "angle"],
            Operation::DetectObjects | Operation::StartTracking => &["droneId", "target"],
            Operation::CreateDataset => &["name", "description"],
            Operation::TrainModel => &["dataset", "name"],
            Operation::ListDatasets
            | Operation::ListModels
            | Operation::SystemHealth
            | Operation::SystemStatus => &[],
            _ => &["droneId"],
        };
        let body: Map<String, Value> = keys
            .iter()
            .filter_map(|k| parameters.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();

        match operation.method() {
            HttpMethod::Get => Self::new(operation),
            _ => Self::new(operation).with_body(Value::Object(body)),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn endpoint(&self) -> &'static str {
        self.operation.endpoint()
    }

    pub fn method(&self) -> HttpMethod {
        self.operation.method()
    }
}

/// Movement parameters for [`BackendClient::move_drone`](crate::BackendClient::move_drone)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drone_id: Option<String>,
    pub direction: String,
    /// Centimetres
    pub distance: i64,
    /// cm/s
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drone_id: Option<String>,
    /// `cw` or `ccw`
    pub direction: String,
    pub angle: i64,
}

/// A 2xx response
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub status: u16,
    pub body: Value,
    pub elapsed: Duration,
}

impl BackendReply {
    /// Body as a JSON object; non-object bodies are wrapped under `data`
    pub fn into_map(self) -> Map<String, Value> {
        match self.body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        }
    }
}

/// A failed call, already classified
#[derive(Debug, Clone, PartialEq)]
pub struct BackendFailure {
    pub error: TaxonomyError,
    /// HTTP status, 0 when no response arrived
    pub status: u16,
    pub elapsed: Duration,
}

impl BackendFailure {
    pub fn new(error: TaxonomyError, status: u16, elapsed: Duration) -> Self {
        Self {
            error,
            status,
            elapsed,
        }
    }
}

pub(crate) fn drone_body(drone_id: Option<&str>) -> Value {
    match drone_id {
        Some(id) => json!({ "droneId": id }),
        None => json!({}),
    }
}
