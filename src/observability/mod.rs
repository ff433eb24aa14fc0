//! Observability
//!
//! - Structured logging through `tracing`, installed by [`init_tracing`]
//! - Metrics through the [`MetricsRecorder`] trait
//!
//! ```rust,ignore
//! use chord_sim::config::Settings;
//! use chord_sim::observability::init_tracing;
//!
//! let settings = Settings::from_env()?;
//! init_tracing(&settings.telemetry)?;
//! ```

pub mod recorder;
pub mod spans;
pub mod tracing_setup;

pub use recorder::{
    noop_metrics, simulated_metrics, MetricType, MetricsRecorder, NoopMetrics, RecordedMetric,
    SharedMetrics, SimulatedMetrics,
};
pub use spans::*;
pub use tracing_setup::init as init_tracing;
