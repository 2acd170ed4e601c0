//! Testability harness utilities.
//!
//! Deterministic stand-ins for hardware and for the consumer side of a run,
//! shared by unit tests, the integration suite and dry runs from the CLI.

mod collecting_sink;
mod scripted_driver;

pub use collecting_sink::CollectingSink;
pub use scripted_driver::ScriptedDriver;
