//! Signature update pipeline.
//!
//! Rows flow through:
//! 1. `partition()`: row validation and grouping by user
//! 2. `UpdatePlanner::plan_and_apply()`: fetch, ownership check, policy, single write
//! 3. `RunReport`: ordered outcomes and counts
//!
//! `Orchestrator` owns the run configuration and the shared rate limiter.

pub mod orchestrator;
pub mod planner;
pub mod report;
pub mod types;

pub use orchestrator::{Orchestrator, UserBatch, partition};
pub use planner::UpdatePlanner;
pub use report::{OutcomeCounts, RunReport, UserSummary};
pub use types::{ReasonCode, RowOutcome, RunOutcome};
