//! CLI command implementations.
//!
//! Every command returns the process exit code on success so that a completed run with an
//! unmatched telemetry record can still exit non-zero.

mod helpers;
mod history;
mod lookup;
mod run;
mod submit;

pub use history::history;
pub use lookup::lookup;
pub use run::run;
pub use submit::submit;

#[cfg(test)]
mod tests;
