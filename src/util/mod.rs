//! Utility modules: timeout, lock helpers.

pub mod sync;
pub mod timeout;
