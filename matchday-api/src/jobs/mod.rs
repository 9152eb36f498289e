//! Background Jobs for the Matchday API
//!
//! - `refresh`: the tiered refresh scheduler (recent, extended, cleanup)
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = Arc::new(RefreshScheduler::new(/* ... */));
//! scheduler.warm_up().await;
//! scheduler.start();
//!
//! // On shutdown
//! scheduler.stop().await;
//! ```

pub mod refresh;

pub use refresh::{CycleReport, RefreshScheduler, SchedulerMetrics, SchedulerSnapshot, SweepReport};
