//! The recurrent actor-critic network and its per-episode state.
//!
//! ```text
//! frame ─ conv1 ─ conv2 ─ projection ─ embedding ─┬─ local LSTM ─┐
//!                                                 ├──────────────┴─ context LSTM ─┬─ actor
//!                                                 │                               ├─ critic ─ (memory blend)
//!                                                 └─ depth head                   └─ depth head
//! ```

pub mod actor_critic;
pub mod distribution;
pub mod encoder;
pub mod heads;
pub mod memory;
pub mod recurrent;

pub use actor_critic::{ActorCritic, RecurrentState, StepCache, StepGradient, StepOutput};
pub use distribution::Categorical;
pub use encoder::Encoder;
pub use heads::DepthHead;
pub use memory::{EpisodeMemory, ValueMemory};
pub use recurrent::{CoreGradient, RecurrentCore};
