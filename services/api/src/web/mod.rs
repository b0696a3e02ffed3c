pub mod applications;
pub mod auth;
pub mod conversations;
pub mod middleware;
pub mod profile;
pub mod recommendations;
pub mod rest;
pub mod router;
pub mod state;
pub mod turn_relay;
pub mod vector_stores;

// Re-export what the binaries need to build the server.
pub use middleware::require_auth;
pub use router::build_router;
