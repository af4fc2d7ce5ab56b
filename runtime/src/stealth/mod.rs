//! Human-like behavior for persona browsing.
//!
//! Reading and link-follow simulation, the random source that paces it,
//! and the fingerprint patch that keeps the browser from looking automated.

pub mod behavior;
pub mod fingerprint;
pub mod random;
