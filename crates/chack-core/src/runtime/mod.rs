//! Runtime services.

pub mod channel;
