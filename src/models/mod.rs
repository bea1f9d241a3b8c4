//! Core data models for decoded extension packages

pub mod package;
pub mod certificate;
pub mod manifest;

pub use package::*;
pub use certificate::*;
pub use manifest::*;
