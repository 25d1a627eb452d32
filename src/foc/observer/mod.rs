//! Sensorless rotor-angle observers.
//!
//! Out of scope for design review per the crate's purpose statement — these
//! are standard-DSP collaborators the FOC pipeline dispatches into, kept
//! here only so the pipeline compiles end to end.

pub mod hfi;
pub mod smo;

pub use hfi::Hfi;
pub use smo::Smo;
