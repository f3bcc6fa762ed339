//! Occupancy monitoring on top of per-area tracking.
//!
//! This crate provides:
//! - The frame pipeline (track, count, publish, alert)
//! - The state board holding each area's latest counts
//! - Threshold alerting with a per-area cooldown
//! - A periodic historical recorder and a zone sync service
//! - Configuration, logging and metrics helpers

pub mod alerts;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod recorder;
pub mod service;
pub mod state;
pub mod zone_sync;

pub use alerts::{format_zone_details, AlertManager};
pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use logging::AreaLogger;
pub use pipeline::{FrameInput, FramePipeline, ProcessedFrame};
pub use recorder::{HistoricalRecorder, RecordStats, RecorderHandle};
pub use service::ServiceHandle;
pub use state::{AreaStateSource, StateBoard};
pub use zone_sync::ZoneSyncService;
