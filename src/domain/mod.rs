//! Domain models for resource events, diagnostic context and findings

mod context;
mod event;
mod finding;

pub use context::*;
pub use event::*;
pub use finding::*;
