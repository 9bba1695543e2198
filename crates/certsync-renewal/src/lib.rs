//! Certificate renewal orchestration
//!
//! [`RenewalOrchestrator`] routes an [`InvocationRequest`] to one of three modes and
//! brackets every mode with the account-state lifecycle: initialize, pull, work, push,
//! cleanup. Per-certificate failures during a renewal pass become result records; the
//! batch always runs to the end.

mod backup;
mod errors;
pub mod invocation;
mod orchestrator;
pub mod state;

pub use backup::backup_prefix_for;
pub use errors::RenewalError;
pub use invocation::{
    AcquirePayload, InvocationRequest, InvocationResponse, RegisterPayload, RenewPayload,
    ResponseBody,
};
pub use orchestrator::RenewalOrchestrator;
pub use state::RenewalState;
