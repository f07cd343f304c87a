//! Feed update scheduling
//!
//! This module decides when each feed is fetched and orchestrates the
//! per-feed processing pipeline:
//!
//! - [`rate`] - effective refresh interval resolution (tier, user
//!   override, administrator schedules)
//! - [`slot`] - deterministic slot offsets and per-tick window selection
//! - [`runner`] - the tick loop and worker fan-out
//! - [`backfill`] - slot-offset migration for legacy feeds

pub mod backfill;
pub mod error;
pub mod rate;
pub mod runner;
pub mod slot;

pub use backfill::{backfill_slot_offsets, BackfillReport};
pub use error::{SchedulerError, SchedulerResult};
pub use rate::{BenefitsProvider, RefreshRateResolver, StaticBenefitsProvider, TierRates};
pub use runner::{RunnerContext, UpdateRunner};
pub use slot::{due_feeds_condition, slot_offset_ms, SlotWindow};
