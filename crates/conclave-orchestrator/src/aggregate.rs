use std::collections::HashMap;

use conclave_types::{AggregatedResult, AggregatedResultMetadata, AggregationStatus, TaskResult, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Array of every completed `result.output`, in completion order.
    Merge,
    /// First `success`-status output, or `null`.
    SelectBest,
}

#[allow(clippy::too_many_arguments)]
pub fn aggregate(
    completed: &HashMap<String, TaskResult>,
    completion_order: &[String],
    failure_count: usize,
    total: usize,
    allow_partial_success: bool,
    partial_success_threshold: f64,
    merge_strategy: MergeStrategy,
    total_duration_ms: i64,
    total_tokens: u64,
    total_retries: u32,
) -> AggregatedResult {
    let success_count = completed.len();

    let status = if failure_count == 0 && success_count == total {
        AggregationStatus::Success
    } else if success_count == 0 {
        AggregationStatus::Failure
    } else if allow_partial_success
        && total > 0
        && (success_count as f64 / total as f64) >= partial_success_threshold
    {
        AggregationStatus::Partial
    } else {
        AggregationStatus::Failure
    };

    let output = match merge_strategy {
        MergeStrategy::SelectBest => completion_order
            .iter()
            .filter_map(|id| completed.get(id))
            .find(|r| r.status == TaskStatus::Success)
            .map(|r| r.output.clone())
            .unwrap_or(serde_json::Value::Null),
        MergeStrategy::Merge => serde_json::Value::Array(
            completion_order
                .iter()
                .filter_map(|id| completed.get(id))
                .map(|r| r.output.clone())
                .collect(),
        ),
    };

    AggregatedResult {
        status,
        output,
        per_subtask: completed.clone(),
        success_count,
        failure_count,
        metadata: AggregatedResultMetadata {
            total_duration_ms,
            total_tokens,
            total_retries,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{TaskMetrics, TraceData};

    fn result(status: TaskStatus, output: serde_json::Value) -> TaskResult {
        TaskResult {
            task_id: "s".to_string(),
            status,
            output,
            artifacts: Vec::new(),
            metrics: TaskMetrics::default(),
            trace: TraceData::default(),
        }
    }

    #[test]
    fn all_success_with_no_failures_is_success() {
        let mut completed = HashMap::new();
        completed.insert("a".to_string(), result(TaskStatus::Success, serde_json::json!(1)));
        let order = vec!["a".to_string()];
        let agg = aggregate(&completed, &order, 0, 1, false, 0.5, MergeStrategy::Merge, 10, 5, 0);
        assert_eq!(agg.status, AggregationStatus::Success);
        assert_eq!(agg.output, serde_json::json!([1]));
    }

    #[test]
    fn zero_successes_is_failure() {
        let completed = HashMap::new();
        let agg = aggregate(&completed, &[], 2, 2, true, 0.5, MergeStrategy::Merge, 10, 0, 0);
        assert_eq!(agg.status, AggregationStatus::Failure);
    }

    #[test]
    fn partial_success_above_threshold_with_flag_set() {
        let mut completed = HashMap::new();
        completed.insert("a".to_string(), result(TaskStatus::Success, serde_json::json!(1)));
        let order = vec!["a".to_string()];
        let agg = aggregate(&completed, &order, 1, 2, true, 0.5, MergeStrategy::Merge, 10, 0, 0);
        assert_eq!(agg.status, AggregationStatus::Partial);
    }

    #[test]
    fn below_threshold_or_flag_unset_is_failure_despite_partial_successes() {
        let mut completed = HashMap::new();
        completed.insert("a".to_string(), result(TaskStatus::Success, serde_json::json!(1)));
        let order = vec!["a".to_string()];
        let agg = aggregate(&completed, &order, 1, 2, false, 0.5, MergeStrategy::Merge, 10, 0, 0);
        assert_eq!(agg.status, AggregationStatus::Failure);
    }

    #[test]
    fn select_best_returns_first_success_in_completion_order() {
        let mut completed = HashMap::new();
        completed.insert("a".to_string(), result(TaskStatus::Failure, serde_json::json!("bad")));
        completed.insert("b".to_string(), result(TaskStatus::Success, serde_json::json!("good")));
        let order = vec!["a".to_string(), "b".to_string()];
        let agg = aggregate(&completed, &order, 1, 2, true, 0.5, MergeStrategy::SelectBest, 10, 0, 0);
        assert_eq!(agg.output, serde_json::json!("good"));
    }
}
