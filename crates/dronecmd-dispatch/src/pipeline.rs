//! Command pipeline: interpret, then dispatch.

use crate::dispatcher::Dispatcher;
use dronecmd_config::ConfigHandle;
use dronecmd_core::{Command, CommandResult, ExecutionContext};
use dronecmd_in::Interpreter;
use std::sync::Arc;
use tracing::debug;

/// Runs a free-text [`Command`] end to end
#[derive(Clone)]
pub struct CommandPipeline {
    interpreter: Arc<Interpreter>,
    dispatcher: Dispatcher,
}

impl CommandPipeline {
    pub fn new(interpreter: Arc<Interpreter>, dispatcher: Dispatcher) -> Self {
        Self {
            interpreter,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn config(&self) -> &ConfigHandle {
        self.dispatcher.config()
    }

    /// Interpret and dispatch one command.
    ///
    /// A command below the confidence threshold fails with
    /// `INVALID_COMMAND` and never reaches the dispatcher.
    pub async fn execute(&self, command: &Command, ctx: &ExecutionContext) -> CommandResult {
        let ctx = match (&ctx.device_id, command.device_id()) {
            (None, Some(device)) => ctx.clone().device(Some(device.to_string())),
            _ => ctx.clone(),
        };
        let threshold = self.config().current().interpreter.confidence_threshold;

        let intent = match self.interpreter.interpret(command, threshold) {
            Ok(intent) => intent,
            Err(err) => {
                let err = ctx.annotate(err);
                err.log();
                return CommandResult::failed(&err, None, None);
            }
        };
        debug!(
            correlation_id = %ctx.correlation_id,
            action = %intent.action,
            confidence = intent.confidence,
            "command interpreted"
        );

        self.dispatcher
            .dispatch(intent, command.options.as_ref(), &ctx)
            .await
    }
}
