//! Runs content propagation tools (export, import, verify, file copy) as
//! tracked background jobs and classifies their outcome from the log text.

pub mod core;
