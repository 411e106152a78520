//! Default inspection routine.
//!
//! Probes every endpoint the node depends on with plain JSON-RPC calls at the
//! target block: the chain RPC the scanner reads from, the local JSON-RPC
//! proxy agents talk to, and the trace RPC when trace checks are on. Each
//! probe contributes indicators even when a sibling probe fails; failures are
//! folded into one error returned alongside the results.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::{fmt, time::Duration};
use tracing::debug;

use vigil_core::inspection::{
    ChainClient, InspectionError, InspectionOutcome, InspectionRoutine,
    JsonRpcChainClient, format_quantity,
};
use vigil_model::{InspectionInputs, InspectionResults};

pub const SCAN_API: &str = "scan_api";
pub const PROXY_API: &str = "proxy_api";
pub const TRACE_API: &str = "trace_api";

pub const NETWORK_SAVING_MODE_KEY: &str = "network_saving_mode";

/// What one endpoint probe learned, kept for cross-endpoint comparisons.
#[derive(Debug, Default)]
struct EndpointProbe {
    latest: Option<u64>,
    block_hash: Option<String>,
}

/// Failures collected across probes of one inspection.
#[derive(Debug, Default)]
struct ProbeErrors(Vec<String>);

impl ProbeErrors {
    fn push(&mut self, endpoint: &str, message: impl fmt::Display) {
        self.0.push(format!("{endpoint}: {message}"));
    }

    fn into_error(self) -> Option<InspectionError> {
        if self.0.is_empty() {
            None
        } else {
            Some(InspectionError::routine(self.0.join("; ")))
        }
    }
}

fn indicator(endpoint: &str, name: &str) -> String {
    format!("{endpoint}.{name}")
}

/// JSON-RPC probe of the scan, proxy and trace endpoints.
#[derive(Clone)]
pub struct RpcProbeInspector {
    http: reqwest::Client,
}

impl fmt::Debug for RpcProbeInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcProbeInspector").finish_non_exhaustive()
    }
}

impl RpcProbeInspector {
    /// `request_timeout` bounds every single JSON-RPC call.
    pub fn new(request_timeout: Duration) -> Result<Self, InspectionError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn client(&self, url: &str) -> JsonRpcChainClient {
        JsonRpcChainClient::with_client(self.http.clone(), url)
    }

    async fn probe_endpoint(
        &self,
        endpoint: &str,
        url: &str,
        inputs: &InspectionInputs,
        results: &mut InspectionResults,
        errors: &mut ProbeErrors,
    ) -> EndpointProbe {
        let client = self.client(url);
        let mut probe = EndpointProbe::default();

        match client.block_number().await {
            Ok(latest) => {
                results.set_flag(indicator(endpoint, "accessible"), true);
                results.set_indicator(
                    indicator(endpoint, "latest_block"),
                    latest as f64,
                );
                probe.latest = Some(latest);
            }
            Err(err) => {
                results.set_flag(indicator(endpoint, "accessible"), false);
                errors.push(endpoint, err);
                return probe;
            }
        }

        // Full transaction bodies are only downloaded outside saving mode.
        let full_blocks = !inputs.network_saving_mode;
        let params = json!([format_quantity(inputs.block_number), full_blocks]);

        match client.call("eth_getBlockByNumber", params).await {
            Ok(Value::Object(block)) => {
                results.set_flag(indicator(endpoint, "block_available"), true);
                if let Some(hash) = block.get("hash").and_then(Value::as_str) {
                    results.set_metadata(indicator(endpoint, "block_hash"), hash);
                    probe.block_hash = Some(hash.to_string());
                }
                if full_blocks
                    && let Some(txs) =
                        block.get("transactions").and_then(Value::as_array)
                {
                    results.set_indicator(
                        indicator(endpoint, "block_transactions"),
                        txs.len() as f64,
                    );
                }
            }
            Ok(other) => {
                results.set_flag(indicator(endpoint, "block_available"), false);
                errors.push(
                    endpoint,
                    format!(
                        "block {} not available (got {other})",
                        inputs.block_number
                    ),
                );
            }
            Err(err) => {
                results.set_flag(indicator(endpoint, "block_available"), false);
                errors.push(endpoint, err);
            }
        }

        probe
    }

    async fn probe_trace(
        &self,
        inputs: &InspectionInputs,
        results: &mut InspectionResults,
        errors: &mut ProbeErrors,
    ) {
        let Some(url) = inputs.trace_api_url.as_deref() else {
            errors.push(TRACE_API, "trace check requested without a trace url");
            return;
        };

        let params = json!([format_quantity(inputs.block_number)]);
        match self.client(url).call("trace_block", params).await {
            Ok(Value::Array(traces)) => {
                results.set_flag(indicator(TRACE_API, "accessible"), true);
                results.set_flag(indicator(TRACE_API, "supported"), true);
                results.set_indicator(
                    indicator(TRACE_API, "traces"),
                    traces.len() as f64,
                );
            }
            Ok(other) => {
                results.set_flag(indicator(TRACE_API, "accessible"), true);
                results.set_flag(indicator(TRACE_API, "supported"), false);
                errors.push(TRACE_API, format!("unexpected trace_block result {other}"));
            }
            Err(err @ InspectionError::Rpc(_)) => {
                results.set_flag(indicator(TRACE_API, "accessible"), true);
                results.set_flag(indicator(TRACE_API, "supported"), false);
                errors.push(TRACE_API, err);
            }
            Err(err) => {
                results.set_flag(indicator(TRACE_API, "accessible"), false);
                errors.push(TRACE_API, err);
            }
        }
    }
}

fn compare_endpoints(
    scan: &EndpointProbe,
    proxy: &EndpointProbe,
    block: u64,
    results: &mut InspectionResults,
    errors: &mut ProbeErrors,
) {
    if let (Some(scan_latest), Some(proxy_latest)) = (scan.latest, proxy.latest)
    {
        results.set_indicator(
            indicator(PROXY_API, "lag_blocks"),
            scan_latest as f64 - proxy_latest as f64,
        );
    }

    if let (Some(scan_hash), Some(proxy_hash)) =
        (scan.block_hash.as_deref(), proxy.block_hash.as_deref())
    {
        let matches = scan_hash.eq_ignore_ascii_case(proxy_hash);
        results.set_flag(indicator(PROXY_API, "block_hash_match"), matches);
        if !matches {
            errors.push(
                PROXY_API,
                format!(
                    "block {block} hash {proxy_hash} differs from scan api hash {scan_hash}"
                ),
            );
        }
    }
}

#[async_trait]
impl InspectionRoutine for RpcProbeInspector {
    async fn inspect(&self, inputs: &InspectionInputs) -> InspectionOutcome {
        let mut results = InspectionResults::new(inputs.clone());
        let mut errors = ProbeErrors::default();

        results.set_metadata(
            NETWORK_SAVING_MODE_KEY,
            inputs.network_saving_mode.to_string(),
        );

        let scan = self
            .probe_endpoint(
                SCAN_API,
                &inputs.scan_api_url,
                inputs,
                &mut results,
                &mut errors,
            )
            .await;
        let proxy = self
            .probe_endpoint(
                PROXY_API,
                &inputs.proxy_api_url,
                inputs,
                &mut results,
                &mut errors,
            )
            .await;
        compare_endpoints(
            &scan,
            &proxy,
            inputs.block_number,
            &mut results,
            &mut errors,
        );

        if inputs.check_trace {
            self.probe_trace(inputs, &mut results, &mut errors).await;
        }

        debug!(
            target: "inspection::probe",
            inspecting_at_block = inputs.block_number,
            indicators = results.indicators.len(),
            failures = errors.0.len(),
            "rpc probes finished"
        );

        match errors.into_error() {
            None => InspectionOutcome::success(results),
            Some(err) => InspectionOutcome::partial(results, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> InspectionInputs {
        InspectionInputs {
            block_number: 90,
            scan_api_url: "http://scan".into(),
            proxy_api_url: "http://proxy".into(),
            trace_api_url: None,
            check_trace: false,
            network_saving_mode: false,
        }
    }

    #[test]
    fn hash_mismatch_is_reported_as_an_error() {
        let mut results = InspectionResults::new(inputs());
        let mut errors = ProbeErrors::default();
        let scan = EndpointProbe {
            latest: Some(100),
            block_hash: Some("0xaa".into()),
        };
        let proxy = EndpointProbe {
            latest: Some(97),
            block_hash: Some("0xbb".into()),
        };

        compare_endpoints(&scan, &proxy, 90, &mut results, &mut errors);

        assert_eq!(results.indicator("proxy_api.lag_blocks"), Some(3.0));
        assert_eq!(results.indicator("proxy_api.block_hash_match"), Some(0.0));
        let err = errors.into_error().unwrap().to_string();
        assert!(err.contains("proxy_api"), "{err}");
    }

    #[test]
    fn matching_hashes_compare_case_insensitively() {
        let mut results = InspectionResults::new(inputs());
        let mut errors = ProbeErrors::default();
        let scan = EndpointProbe {
            latest: Some(100),
            block_hash: Some("0xAB".into()),
        };
        let proxy = EndpointProbe {
            latest: Some(100),
            block_hash: Some("0xab".into()),
        };

        compare_endpoints(&scan, &proxy, 90, &mut results, &mut errors);

        assert_eq!(results.indicator("proxy_api.block_hash_match"), Some(1.0));
        assert!(errors.into_error().is_none());
    }

    #[test]
    fn unreachable_endpoints_skip_comparisons() {
        let mut results = InspectionResults::new(inputs());
        let mut errors = ProbeErrors::default();

        compare_endpoints(
            &EndpointProbe::default(),
            &EndpointProbe::default(),
            90,
            &mut results,
            &mut errors,
        );

        assert!(results.indicators.is_empty());
        assert!(errors.into_error().is_none());
    }
}
