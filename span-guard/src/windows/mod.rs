//! Validity window reconstruction and temporal tolerance.

mod reconstruct;
mod tolerance;

pub use reconstruct::{normalized_window_subquery, reconstruct_windows, window_subquery};
pub use tolerance::{CalendarUnit, Tolerance};

pub(crate) use reconstruct::escaped_keys;
