pub mod applier;
pub mod collector;
pub mod manifest_graph;
pub mod native_tool;

pub use applier::ActionEngine;
pub use collector::CollectionEngine;
