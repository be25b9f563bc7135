//! Core data types: trading enums, order intents, and response views.

pub mod enums;
pub mod trading;

pub use enums::*;
pub use trading::*;
