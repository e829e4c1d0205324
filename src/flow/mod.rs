//! Report flow: step sequence, accumulated state and the session store

pub mod store;
pub mod types;

pub use store::{FlowError, FlowSessionStore};
pub use types::*;

#[cfg(test)]
mod tests;
