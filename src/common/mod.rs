//! Common types, errors and trait seams

pub mod channels;
pub mod errors;
pub mod traits;
pub mod types;
