#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod cell;
mod config;
mod deadlock;
mod introspect;
mod latch;
mod mode;
mod monitor;
mod reference_latch;
mod registry;
mod shard;
mod sync;
mod wait;

pub use config::{Config, RegistryError};
pub use introspect::CellSnapshot;
pub use latch::{HolderRecord, Latch, WaitGate};
pub use mode::{Mode, Site, WriterStatus};
pub use monitor::{LockTimeoutHook, LoggingTimeoutHook, LongWaiter};
pub use reference_latch::RwLatch;
pub use registry::{LongWaitReport, Registry};
pub use wait::{NullObserver, WaitObserver, WaitOutcome};
