//! Artifact value types

pub mod analysis;
pub mod coverage;
pub mod localization;
pub mod outcome;
pub mod patch;
pub mod snippet;
pub mod transformation;
