//! Utility modules shared across the service.

pub mod errors;
pub mod string_utils;
