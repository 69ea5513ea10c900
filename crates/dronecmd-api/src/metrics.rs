//! Prometheus counters served on `/metrics`.
use dronecmd_core::{BatchResult, CommandResult, ExecutionMode};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    commands_total: IntCounterVec,
    batches_total: IntCounterVec,
    backend_errors_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let commands_total = IntCounterVec::new(
            Opts::new("dronecmd_commands_total", "Commands by outcome"),
            &["outcome"],
        )?;
        let batches_total = IntCounterVec::new(
            Opts::new("dronecmd_batches_total", "Batches by execution mode"),
            &["mode"],
        )?;
        let backend_errors_total = IntCounterVec::new(
            Opts::new("dronecmd_backend_errors_total", "Failed commands that reached the backend, by error code"),
            &["code"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(batches_total.clone()))?;
        registry.register(Box::new(backend_errors_total.clone()))?;

        Ok(Self {
            registry,
            commands_total,
            batches_total,
            backend_errors_total,
        })
    }

    pub fn observe_command(&self, result: &CommandResult) {
        let outcome = if result.success {
            "success"
        } else if result.skipped {
            "skipped"
        } else {
            "failure"
        };
        self.commands_total.with_label_values(&[outcome]).inc();

        if let Some(error) = &result.error {
            if !result.backend_calls().is_empty() {
                self.backend_errors_total
                    .with_label_values(&[error.code.as_str()])
                    .inc();
            }
        }
    }

    pub fn observe_batch(&self, mode: ExecutionMode, batch: &BatchResult) {
        self.batches_total.with_label_values(&[&mode.to_string()]).inc();
        for result in &batch.results {
            self.observe_command(result);
        }
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
