//! dronecmd Dispatch: from intents to backend calls
//!
//! # Pipeline Flow
//!
//! ```text
//! Command → Interpreter → Intent → Validate → Dispatch (retry) → CommandResult
//!                           ↓          ↓              ↓
//!                    INVALID_COMMAND  Block     BackendCallRecord*
//! ```
//!
//! [`BatchExecutor`] drives many commands through the same
//! [`CommandPipeline`], sequentially or in parallel.

pub mod batch;
pub mod dispatcher;
pub mod pipeline;
pub mod retry;

pub use batch::BatchExecutor;
pub use dispatcher::{plan_for, DispatchState, Dispatcher};
pub use pipeline::CommandPipeline;
pub use retry::RetryPolicy;

pub use tokio_util::sync::CancellationToken;
