//! State shared between worker threads: the parameter store and the global step counter.

pub mod atomic;
pub mod counter;
pub mod parameters;

pub use atomic::AtomicBuffer;
pub use counter::GlobalCounter;
pub use parameters::{ParameterSnapshot, SharedParameters};
