//! Debug tooling: a tracing layer that feeds a debug view, and backend
//! probes that explain why a membership load fails.

pub mod probes;
pub mod tracing_layer;

pub use probes::{DiagnosticReport, ProbeName, ProbeResult, ProbeRunner, ProbeStatus};
pub use tracing_layer::{DiagnosticEvent, DiagnosticEventLayer};
