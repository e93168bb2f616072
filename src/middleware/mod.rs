//! Request middleware: webhook signature verification and rate-limit keying

mod hmac;
mod rate_limit;

pub use hmac::*;
pub use rate_limit::*;
