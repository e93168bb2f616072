//! Domain models for the swaproom relay

mod room;
mod swap;

pub use room::*;
pub use swap::*;
