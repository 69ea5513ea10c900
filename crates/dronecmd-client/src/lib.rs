//! dronecmd Client: the Backend Client
//!
//! One method per backend operation, each performing exactly one HTTP call.
//! Failures come back already classified into the error taxonomy. The
//! client never retries; that is the dispatcher's job.
//!
//! # Example
//!
//! ```no_run
//! use dronecmd_client::{BackendClient, HttpBackendClient, MoveParams};
//! use dronecmd_config::{AppConfig, ConfigHandle};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpBackendClient::new(ConfigHandle::fixed(AppConfig::default()))?;
//! client.takeoff(Some("drone-1")).await.map_err(|f| f.error)?;
//! client
//!     .move_drone(MoveParams {
//!         drone_id: Some("drone-1".into()),
//!         direction: "forward".into(),
//!         distance: 100,
//!         speed: None,
//!     })
//!     .await
//!     .map_err(|f| f.error)?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod http;
pub mod mock;
pub mod request;

pub use classify::{classify_status, classify_transport};
pub use http::{HttpBackendClient, CLIENT_ID_HEADER};
pub use mock::ScriptedBackend;
pub use request::{BackendFailure, BackendReply, BackendRequest, MoveParams, Operation, RotateParams};

use async_trait::async_trait;
use request::drone_body;
use serde_json::{json, Value};

pub type BackendResult = Result<BackendReply, BackendFailure>;

/// Access to the drone backend.
///
/// Implementors provide [`execute`](Self::execute); the per-operation
/// methods build the request and delegate to it.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn execute(&self, request: BackendRequest) -> BackendResult;

    async fn connect(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::Connect).with_body(drone_body(drone_id)))
            .await
    }

    async fn disconnect(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::Disconnect).with_body(drone_body(drone_id)))
            .await
    }

    async fn takeoff(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::Takeoff).with_body(drone_body(drone_id)))
            .await
    }

    async fn land(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::Land).with_body(drone_body(drone_id)))
            .await
    }

    async fn move_drone(&self, params: MoveParams) -> BackendResult {
        let body = serde_json::to_value(&params).unwrap_or(Value::Null);
        self.execute(BackendRequest::new(Operation::Move).with_body(body))
            .await
    }

    async fn rotate(&self, params: RotateParams) -> BackendResult {
        let body = serde_json::to_value(&params).unwrap_or(Value::Null);
        self.execute(BackendRequest::new(Operation::Rotate).with_body(body))
            .await
    }

    async fn emergency_stop(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::EmergencyStop).with_body(drone_body(drone_id)))
            .await
    }

    async fn take_photo(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::TakePhoto).with_body(drone_body(drone_id)))
            .await
    }

    async fn detect_objects(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::DetectObjects).with_body(drone_body(drone_id)))
            .await
    }

    async fn start_tracking(&self, drone_id: Option<&str>, target: &str) -> BackendResult {
        let mut body = drone_body(drone_id);
        body["target"] = json!(target);
        self.execute(BackendRequest::new(Operation::StartTracking).with_body(body))
            .await
    }

    async fn stop_tracking(&self, drone_id: Option<&str>) -> BackendResult {
        self.execute(BackendRequest::new(Operation::StopTracking).with_body(drone_body(drone_id)))
            .await
    }

    async fn list_datasets(&self) -> BackendResult {
        self.execute(BackendRequest::new(Operation::ListDatasets)).await
    }

    async fn create_dataset(&self, name: &str, description: Option<&str>) -> BackendResult {
        let mut body = json!({ "name": name });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        self.execute(BackendRequest::new(Operation::CreateDataset).with_body(body))
            .await
    }

    async fn list_models(&self) -> BackendResult {
        self.execute(BackendRequest::new(Operation::ListModels)).await
    }

    async fn train_model(&self, dataset: &str, name: Option<&str>) -> BackendResult {
        let mut body = json!({ "dataset": dataset });
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        self.execute(BackendRequest::new(Operation::TrainModel).with_body(body))
            .await
    }

    async fn system_health(&self) -> BackendResult {
        self.execute(BackendRequest::new(Operation::SystemHealth)).await
    }

    async fn system_status(&self) -> BackendResult {
        self.execute(BackendRequest::new(Operation::SystemStatus)).await
    }
}

#[async_trait]
impl<T: BackendClient + ?Sized> BackendClient for std::sync::Arc<T> {
    async fn execute(&self, request: BackendRequest) -> BackendResult {
        (**self).execute(request).await
    }
}
