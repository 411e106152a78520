use std::time::Duration;

use vigil_model::InspectionInputs;

use super::RetryPolicy;

pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the scheduler needs, resolved from configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct InspectionSettings {
    /// Inspect every `cadence` blocks.
    pub cadence: u64,
    pub check_trace: bool,
    pub scan_api_url: String,
    pub proxy_api_url: String,
    pub trace_api_url: Option<String>,
    pub network_saving_mode: bool,
    /// `false` keeps the scheduler from starting at all.
    pub enabled: bool,
    pub retry: RetryPolicy,
    pub attempt_timeout: Duration,
    pub watchdog_interval: Duration,
    pub silence_threshold: Duration,
    pub probe_timeout: Duration,
}

impl InspectionSettings {
    /// Enabled settings for `cadence` with the default retry, watchdog and
    /// timeout values. Trace checks start off.
    pub fn new(
        cadence: u64,
        scan_api_url: impl Into<String>,
        proxy_api_url: impl Into<String>,
    ) -> Self {
        Self {
            cadence,
            check_trace: false,
            scan_api_url: scan_api_url.into(),
            proxy_api_url: proxy_api_url.into(),
            trace_api_url: None,
            network_saving_mode: false,
            enabled: true,
            retry: RetryPolicy::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Block to inspect for a block-progress signal, if it qualifies.
    ///
    /// Only positive multiples of the cadence qualify; the target trails the
    /// tip by one cadence.
    pub fn target_block(&self, latest: u64) -> Option<u64> {
        if self.cadence == 0 || latest == 0 || latest % self.cadence != 0 {
            return None;
        }
        Some(latest - self.cadence)
    }

    /// Whether `block` is a multiple of a non-zero cadence.
    pub fn is_inspection_block(&self, block: u64) -> bool {
        self.cadence != 0 && block % self.cadence == 0
    }

    /// Routine inputs for one inspection of `block_number`.
    ///
    /// The trace endpoint is passed only while trace checks are on.
    pub fn inputs_for(&self, block_number: u64) -> InspectionInputs {
        InspectionInputs {
            block_number,
            scan_api_url: self.scan_api_url.clone(),
            proxy_api_url: self.proxy_api_url.clone(),
            trace_api_url: self
                .check_trace
                .then(|| self.trace_api_url.clone())
                .flatten(),
            check_trace: self.check_trace,
            network_saving_mode: self.network_saving_mode,
        }
    }
}
