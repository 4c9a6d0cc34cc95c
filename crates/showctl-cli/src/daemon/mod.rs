//! Daemon process owning the studio automation session.

pub mod client;
pub mod osa;
pub mod paths;
pub mod poll;
pub mod server;
pub mod worker;

// Public API - used by main.rs
pub use client::DaemonClient;
pub use server::DaemonServer;
