//! Runtime settings, read from an optional JSON file.
//!
//! Every field has a default, so a partial file (or no file) is fine:
//!
//! ```json
//! { "default_bitrate_kbps": 192, "log_filter": "audio_cutter_lib=debug" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::bitrate::{quantize_bitrate, BitrateEstimator, DEFAULT_OVERHEAD_FACTOR};
use crate::audio::waveform::DEFAULT_NUM_PEAKS;
use crate::error::{AudioError, Result};

/// Log filter used when neither `RUST_LOG` nor the config file sets one
pub const DEFAULT_LOG_FILTER: &str = "audio_cutter=info,audio_cutter_lib=info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutterConfig {
    /// Export bitrate when the source bitrate cannot be estimated
    pub default_bitrate_kbps: u32,

    /// Share of the source file size assumed to be audio payload
    pub overhead_factor: f64,

    /// Peak pairs computed for the waveform view
    pub waveform_peaks: usize,

    pub musicbrainz_base_url: String,
    pub musicbrainz_user_agent: String,
    pub lookup_timeout_secs: u64,

    pub log_filter: String,
}

impl Default for CutterConfig {
    fn default() -> Self {
        Self {
            default_bitrate_kbps: 256,
            overhead_factor: DEFAULT_OVERHEAD_FACTOR,
            waveform_peaks: DEFAULT_NUM_PEAKS,
            musicbrainz_base_url: "https://musicbrainz.org/ws/2".to_string(),
            musicbrainz_user_agent: concat!(
                "AudioCutter/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/genau7/audio-cutter)"
            )
            .to_string(),
            lookup_timeout_secs: 30,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CutterConfig {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path)
            .map_err(|e| AudioError::Config(format!("{}: {}", path.display(), e)))?;

        let config: CutterConfig = serde_json::from_str(&text)
            .map_err(|e| AudioError::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.overhead_factor > 0.0 && self.overhead_factor <= 1.0) {
            return Err(AudioError::Config(format!(
                "overhead_factor must be in (0, 1], got {}",
                self.overhead_factor
            )));
        }

        if self.waveform_peaks == 0 {
            return Err(AudioError::Config(
                "waveform_peaks must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bitrate_estimator(&self) -> BitrateEstimator {
        BitrateEstimator::new(self.overhead_factor, quantize_bitrate(self.default_bitrate_kbps))
    }
}
