//! HTTP handlers, request validation and response shapes.

pub mod products;
pub mod resources;
pub mod reviews;
pub mod validation;
