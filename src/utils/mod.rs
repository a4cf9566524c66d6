//! Startup and retry helpers shared by binaries and embedding services.

pub mod bootstrap;
pub mod retry;
