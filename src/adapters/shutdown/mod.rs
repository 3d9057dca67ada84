//! Process shutdown adapters.
//!
//! - [`signals`] - OS termination signals and the manual trigger
//! - [`watcher`] - signal → cleanup callbacks → exit

pub mod signals;
pub mod watcher;

pub use signals::{ShutdownTrigger, TerminationSignal};
pub use watcher::{
    run_shutdown_sequence, ShutdownError, ShutdownOutcome, ShutdownSettings, ShutdownWatcher,
};
