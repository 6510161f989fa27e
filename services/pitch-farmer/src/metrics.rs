//! Prometheus metrics exposition
//!
//! The engine emits through the `metrics` facade:
//!
//! - `farm_checks_total` (counter): labels `account`, `outcome`
//! - `farm_claims_total` (counter): labels `account`, `outcome`
//! - `farm_token_refresh_total` (counter): labels `account`, `outcome`
//! - `farm_next_claim_timestamp_seconds` (gauge): label `account`
//!
//! This module adds `farm_accounts_running` and installs the recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition format
/// suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe();
    handle
}

/// Register help text for every metric this process emits.
pub fn describe() {
    metrics::describe_counter!("farm_checks_total", "Farming status checks by outcome");
    metrics::describe_counter!("farm_claims_total", "Farming claims by outcome");
    metrics::describe_counter!(
        "farm_token_refresh_total",
        "Bearer token refreshes by outcome"
    );
    metrics::describe_gauge!(
        "farm_next_claim_timestamp_seconds",
        "End of the current farming window, unix seconds"
    );
    metrics::describe_gauge!("farm_accounts_running", "Account tasks still running");
}

/// Record the number of live account tasks.
pub fn set_accounts_running(count: usize) {
    metrics::gauge!("farm_accounts_running").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        describe();
        set_accounts_running(2);
    }

    /// Uses build_recorder() instead of install_recorder(): only one global
    /// recorder can exist per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn accounts_running_renders_as_gauge() {
        let (recorder, handle) = isolated_recorder();
        {
            let _guard = metrics::set_default_local_recorder(&recorder);
            describe();
            set_accounts_running(3);
        }

        let output = handle.render();
        assert!(output.contains("# TYPE farm_accounts_running gauge"), "got {output}");
        assert!(output.contains("farm_accounts_running 3"), "got {output}");
    }

    #[test]
    fn engine_counters_render_with_labels() {
        let (recorder, handle) = isolated_recorder();
        {
            let _guard = metrics::set_default_local_recorder(&recorder);
            metrics::counter!("farm_claims_total", "account" => "628111", "outcome" => "ok")
                .increment(1);
        }

        let output = handle.render();
        assert!(
            output.contains(r#"farm_claims_total{account="628111",outcome="ok"} 1"#),
            "got {output}"
        );
    }
}
