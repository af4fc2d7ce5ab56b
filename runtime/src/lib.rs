//! Fogcover runtime: synthetic browsing on behalf of configured personas.
//!
//! Each active persona gets its own isolated browser profile and a control
//! loop that asks a text-generation service what to read, visits those pages
//! like a person would, and records where it went. A scheduler turns
//! personas on and off inside their weekly windows, and the metrics module
//! scores how diffuse the resulting traffic is.

pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod metrics;
pub mod persona;
pub mod provider;
pub mod renderer;
pub mod runner;
pub mod scheduler;
pub mod stealth;
pub mod store;
