//! metrics_snapshot tool implementation.

use labelgate_core::Metrics;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;

/// Current window and lifetime counters. Reading does not reset the window.
pub fn snapshot_impl(metrics: &Metrics) -> Result<CallToolResult, McpError> {
    json_result(&metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use labelgate_core::metrics::{Counter, MetricsSnapshot};

    #[test]
    fn test_snapshot_impl() {
        let metrics = Metrics::new();
        metrics.incr(Counter::CacheHit);
        metrics.add(Counter::RetryAttempt, 3);

        let snapshot: MetricsSnapshot = parse_output(&snapshot_impl(&metrics).unwrap());
        assert_eq!(snapshot.window(Counter::CacheHit), 1);
        assert_eq!(snapshot.total(Counter::RetryAttempt), 3);
        assert_eq!(snapshot.total(Counter::SearchError), 0);

        // Reading again sees the same window.
        let again: MetricsSnapshot = parse_output(&snapshot_impl(&metrics).unwrap());
        assert_eq!(again, snapshot);
    }
}
