//! Stack-height optimization for textile cutting rooms.
//!
//! Items sharing a reference and color are cut from one stack of fabric
//! layers. The optimizer picks a stack height per group and rounds every
//! quantity to a multiple of it, never beyond the requested tolerance.

pub mod arith;
pub mod ingest;
pub mod optimizer;
pub mod session;
pub mod store;
pub mod trainer;
pub mod types;

pub use arith::{adjust_to_layers, gcd, gcd_multiple};
pub use ingest::{ingest, MAX_ROWS};
pub use optimizer::{find_stack_height, optimize, optimize_with_model, Optimizer};
pub use session::OptimizationSession;
pub use store::{InMemoryLogStore, InMemoryModelStore, LogStore, ModelStore};
pub use trainer::{train, RawRecord, Trainer, TrainerConfig};
pub use types::*;
