//! dronecmd core: error taxonomy and data model
//!
//! Shared by every stage of the pipeline:
//!
//! ```text
//! Command → Interpreter → Intent → Dispatcher → Backend Client → CommandResult
//!                                      ↓ (failure)
//!                                 TaxonomyError
//! ```

pub mod context;
pub mod data_model;
pub mod error;

pub use context::ExecutionContext;
pub use data_model::{
    BackendCallRecord, BatchRequest, BatchResult, BatchSummary, Command, CommandContext,
    CommandOptions, CommandResult, ExecutionDetails, ExecutionMode, HttpMethod, Intent,
    SKIPPED_CANCELLED, SKIPPED_PRIOR_FAILURE,
};
pub use error::{codes, kind_for_code, ErrorContext, ErrorKind, SerializedError, TaxonomyError};

/// Crate version reported by health endpoints
pub const DRONECMD_VERSION: &str = env!("CARGO_PKG_VERSION");
