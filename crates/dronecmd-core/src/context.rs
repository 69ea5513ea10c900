//! Execution Context: correlation data carried through one request
use std::collections::HashMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub correlation_id: String,
    pub request_id: Option<String>,
    pub device_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::with_correlation_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            request_id: None,
            device_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    /// Child context for one command of a batch; keeps the correlation id
    pub fn child(&self, index: usize) -> Self {
        let mut child = self.clone();
        child.request_id = Some(format!(
            "{}#{}",
            self.request_id.as_deref().unwrap_or(&self.correlation_id),
            index
        ));
        child
    }

    /// Stamp correlation fields onto an error
    pub fn annotate(&self, err: crate::error::TaxonomyError) -> crate::error::TaxonomyError {
        let err = err.with_correlation_id(self.correlation_id.clone());
        match &self.request_id {
            Some(id) => err.with_request_id(id.clone()),
            None => err,
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
