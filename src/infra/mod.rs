//! Infrastructure adapters and runtime bootstrap.

pub mod cache;
pub mod error;
pub mod http;
pub mod notion;
pub mod openrouter;
pub mod reader;
pub mod telemetry;
