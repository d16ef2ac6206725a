//! Observable in-memory cells.
//!
//! A store keeps its current value in a `Signal`, so UI code can read it
//! synchronously and subscribe to changes caused by writes or hydration.

mod signal;

pub use signal::{Signal, Subscription};
