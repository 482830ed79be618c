//! Pipeline configuration types.
//!
//! Plain data holders with production defaults. Parsing from the
//! environment lives in the worker binary; library code takes these structs
//! so tests can build arbitrary shapes without touching the environment.

use std::path::PathBuf;
use std::time::Duration;

use casework_core::channels;

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::flush::DEFAULT_FLUSH_INTERVAL;
use crate::health::MonitorConfig;
use crate::replay::ReplayConfig;

/// The channel names the pipeline publishes to and consumes from.
#[derive(Debug, Clone)]
pub struct EventChannels {
    pub audit: String,
    pub session: String,
    pub error: String,
}

impl EventChannels {
    /// All channels, in subscription order.
    pub fn all(&self) -> [String; 3] {
        [
            self.audit.clone(),
            self.session.clone(),
            self.error.clone(),
        ]
    }
}

impl Default for EventChannels {
    fn default() -> Self {
        Self {
            audit: channels::CHANNEL_AUDIT.to_string(),
            session: channels::CHANNEL_SESSION.to_string(),
            error: channels::CHANNEL_ERROR.to_string(),
        }
    }
}

/// Everything the worker needs to assemble the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for the consumer-side buffer journals.
    pub buffer_dir: PathBuf,
    /// Directory for the producer-side fallback files.
    pub fallback_dir: PathBuf,
    pub channels: EventChannels,
    pub buffer_capacity: usize,
    /// Shared by both health monitors.
    pub monitor: MonitorConfig,
    pub replay: ReplayConfig,
    pub flush_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_dir: PathBuf::from("./data/event_buffer"),
            fallback_dir: PathBuf::from("./data/fallback_events"),
            channels: EventChannels::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            monitor: MonitorConfig::default(),
            replay: ReplayConfig::default(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}
