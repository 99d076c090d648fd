//! Handlers shared by every service binary.

pub mod health;

pub use health::health_check;
