//! Network building blocks with explicit forward caches and analytic backward passes.
//!
//! Every layer's `forward` is `&self` and returns a cache; `backward` consumes that cache and
//! accumulates parameter gradients into a second instance of the same layer. This keeps a
//! worker's model immutable during a rollout and lets the gradient share the model's flat
//! parameter layout.

pub mod conv;
pub mod initialization;
pub mod linear;
pub mod lstm;
pub mod traits;

pub use conv::{Conv1d, Conv1dCache, Conv2d, Conv2dCache};
pub use initialization::{normalized_columns, WeightInit};
pub use linear::{Linear, LinearCache};
pub use lstm::{CellState, LstmCache, LstmCell};
pub use traits::{Initializable, Parameterized};
