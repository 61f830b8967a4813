mod lease;
mod orchestrator;
mod report;

pub use lease::{SyncGuard, SyncLease};
pub use orchestrator::SyncOrchestrator;
pub use report::{
    FailedPush, PullReport, PushReport, PushedRecord, SyncOutcome, SyncReport, SyncTrigger,
};
