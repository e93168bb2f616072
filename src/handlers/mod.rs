//! HTTP and WebSocket handlers for the swaproom relay

mod health;
mod rooms;
mod webhook;
mod ws;

pub use health::*;
pub use rooms::*;
pub use webhook::*;
pub use ws::*;
