//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console formatting
//! - Rolling JSON log files

pub mod logger;

pub use logger::LoggerImpl;
