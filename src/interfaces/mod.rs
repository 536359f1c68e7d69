//! Command-line surface: the store fixture, the command script and the event output.

pub mod csv;
pub mod fixture;
pub mod script;
