//! Personas: who browses, when, and how hard.

pub mod manager;
pub mod types;

pub use manager::{PersonaDraft, PersonaManager};
pub use types::{DelayRange, Intensity, IntensityProfile, Persona, Schedule};
