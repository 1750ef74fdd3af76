//! Utility functions for the application

pub mod crypto;
pub mod ids;
pub mod otlp;
pub mod time;
