// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod connlog;
pub mod decoder;
pub mod link;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod speed;
