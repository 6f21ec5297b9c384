// Infrastructure layer (shared components)
pub mod config;
pub mod crypto;
pub mod error;
pub mod metrics;

// Domain layer (business logic)
pub mod bus;
pub mod dispatch;
pub mod domain;
pub mod provider;
pub mod queue;
pub mod routing;
pub mod store;
pub mod template;
pub mod tracking;

// Application layer
pub mod api;
pub mod server;
