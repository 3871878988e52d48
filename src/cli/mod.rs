//! Command implementations. Plain line output only; the data core does
//! the real work.

pub mod correlate;
pub mod health;
pub mod snapshot;
