//! services/api/src/workflows/mod.rs
//!
//! Multi-step operations that span several ports. Handlers in `web` stay thin
//! and call into these.

pub mod accounts;
pub mod applications;
pub mod assistant;
pub mod conversations;
pub mod recommendations;
pub mod turn;
