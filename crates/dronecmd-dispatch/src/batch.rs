//! Batch Executor
//!
//! Sequential batches run strictly one command at a time. Parallel batches
//! fan out over a semaphore-bounded [`JoinSet`]; every task carries its
//! input index, so results land in a pre-sized slot vector and always come
//! back in input order.

use crate::pipeline::CommandPipeline;
use dronecmd_core::{
    BatchRequest, BatchResult, Command, CommandResult, ExecutionContext, ExecutionMode,
    TaxonomyError, SKIPPED_CANCELLED, SKIPPED_PRIOR_FAILURE,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct BatchExecutor {
    pipeline: Arc<CommandPipeline>,
}

impl BatchExecutor {
    pub fn new(pipeline: Arc<CommandPipeline>) -> Self {
        Self { pipeline }
    }

    pub async fn execute(&self, request: &BatchRequest, ctx: &ExecutionContext) -> BatchResult {
        self.execute_with_cancel(request, ctx, CancellationToken::new())
            .await
    }

    /// Run a batch until done or until `cancel` fires.
    ///
    /// Commands that never started when the token fired come back as
    /// `"skipped: batch cancelled"`.
    pub async fn execute_with_cancel(
        &self,
        request: &BatchRequest,
        ctx: &ExecutionContext,
        cancel: CancellationToken,
    ) -> BatchResult {
        let started = Instant::now();
        let results = match request.execution_mode {
            ExecutionMode::Sequential => {
                self.run_sequential(&request.commands, request.stop_on_error, ctx, &cancel)
                    .await
            }
            ExecutionMode::Parallel => self.run_parallel(&request.commands, ctx, &cancel).await,
        };
        let batch = BatchResult::from_results(results, started.elapsed().as_millis() as u64);

        info!(
            correlation_id = %ctx.correlation_id,
            mode = %request.execution_mode,
            total = batch.summary.total,
            successful = batch.summary.successful,
            failed = batch.summary.failed,
            skipped = batch.summary.skipped,
            elapsed_ms = batch.summary.total_execution_time_ms,
            "batch finished"
        );
        batch
    }

    async fn run_sequential(
        &self,
        commands: &[Command],
        stop_on_error: bool,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(commands.len());
        let mut halted = false;

        for (index, command) in commands.iter().enumerate() {
            if cancel.is_cancelled() {
                results.push(CommandResult::skipped(SKIPPED_CANCELLED));
                continue;
            }
            if halted {
                results.push(CommandResult::skipped(SKIPPED_PRIOR_FAILURE));
                continue;
            }

            let result = self.pipeline.execute(command, &ctx.child(index)).await;
            if !result.success && stop_on_error {
                halted = true;
            }
            results.push(result);
        }
        results
    }

    async fn run_parallel(
        &self,
        commands: &[Command],
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Vec<CommandResult> {
        let limit = self.pipeline.config().current().batch.max_concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for (index, command) in commands.iter().cloned().enumerate() {
            let pipeline = self.pipeline.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let ctx = ctx.child(index);

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let result = match permit {
                    Some(_permit) if !cancel.is_cancelled() => pipeline.execute(&command, &ctx).await,
                    _ => CommandResult::skipped(SKIPPED_CANCELLED),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<CommandResult>> = vec![None; commands.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!(error = %e, "batch task failed"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    let err = ctx.annotate(TaxonomyError::drone("command task aborted"));
                    CommandResult::failed(&err, None, None)
                })
            })
            .collect()
    }
}
