// Core domain
pub mod message;
pub mod queue;

// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod tasks;
