pub mod blueprint;
pub mod config;
pub mod context;
pub mod event;
pub mod executor;
pub mod node;
pub mod registry;
pub mod scope;
pub mod state;
