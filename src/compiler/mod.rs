pub mod core;
pub mod graph;
pub mod loader;
