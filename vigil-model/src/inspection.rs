use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Endpoint configuration an inspection ran against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionInputs {
    pub block_number: u64,
    pub scan_api_url: String,
    pub proxy_api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_api_url: Option<String>,
    pub check_trace: bool,
    #[serde(default)]
    pub network_saving_mode: bool,
}

/// Structured outcome of one self-inspection.
///
/// Indicators are numeric so that downstream consumers can aggregate them
/// without knowing every check by name. They are kept independent of any
/// error hit while collecting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionResults {
    pub inputs: InspectionInputs,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub inspected_at: DateTime<Utc>,
}

impl InspectionResults {
    pub fn new(inputs: InspectionInputs) -> Self {
        Self {
            inputs,
            indicators: BTreeMap::new(),
            metadata: BTreeMap::new(),
            inspected_at: Utc::now(),
        }
    }

    pub fn set_indicator(&mut self, name: impl Into<String>, value: f64) {
        self.indicators.insert(name.into(), value);
    }

    pub fn set_flag(&mut self, name: impl Into<String>, ok: bool) {
        self.set_indicator(name, if ok { 1.0 } else { 0.0 });
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }

    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.metadata.insert(key.into(), value.into());
    }
}
