//! Common types and utilities shared across the crate.

mod constants;
mod record;
mod util;
mod value;

pub use constants::*;
pub use record::Record;
pub use util::{atomic, epoch_millis, epoch_millis_or_zero, Atomic};
pub use value::Value;
