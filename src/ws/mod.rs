//! Read-only announcement stream for observers

pub mod handler;
pub mod protocol;
