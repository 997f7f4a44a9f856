//! Type definitions for the digital twin engine

pub mod alert;
pub mod sample;

pub use alert::Alert;
pub use sample::{AnnotatedRow, RawSample};
