pub mod tracker;

pub use tracker::{EpisodeSummary, EpisodeTracker};
