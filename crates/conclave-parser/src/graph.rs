//! Referential and structural validation over a shape-valid `PlanningOutput`:
//! existence of referenced ids, self-dependency, acyclicity, disjoint step
//! partitioning, and the estimate-sum sanity warning.

use std::collections::{HashMap, HashSet};

use crate::shape::PlanningOutput;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct GraphError(pub String);

/// Non-fatal observations surfaced alongside a structurally valid plan.
#[derive(Debug, Clone, Default)]
pub struct GraphWarnings {
    pub estimate_sum_mismatch: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Detects a cycle in `edges` (subtask id -> dependency ids) via DFS with
/// grey/black coloring. A grey revisit signals a cycle.
fn detect_cycle(edges: &HashMap<&str, &Vec<String>>) -> Option<Vec<String>> {
    let mut color: HashMap<&str, Color> = edges.keys().map(|id| (*id, Color::White)).collect();
    let mut path: Vec<String> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, &'a Vec<String>>,
        color: &mut HashMap<&'a str, Color>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        color.insert(node, Color::Grey);
        path.push(node.to_string());
        if let Some(deps) = edges.get(node) {
            for dep in deps.iter() {
                match color.get(dep.as_str()) {
                    Some(Color::Grey) => {
                        path.push(dep.clone());
                        return Some(path.clone());
                    }
                    Some(Color::White) => {
                        if let Some(cycle) = visit(dep.as_str(), edges, color, path) {
                            return Some(cycle);
                        }
                    }
                    _ => {}
                }
            }
        }
        path.pop();
        color.insert(node, Color::Black);
        None
    }

    for id in edges.keys() {
        if color.get(id) == Some(&Color::White) {
            if let Some(cycle) = visit(id, edges, &mut color, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Validates referential integrity and graph acyclicity. Returns warnings
/// that do not block acceptance.
pub fn validate_graph(output: &PlanningOutput) -> Result<GraphWarnings, GraphError> {
    let ids: HashSet<&str> = output.subtasks.iter().map(|s| s.id.as_str()).collect();

    for subtask in &output.subtasks {
        if subtask.dependencies.iter().any(|d| d == &subtask.id) {
            return Err(GraphError(format!(
                "subtask '{}' may not depend on itself",
                subtask.id
            )));
        }
        for dep in &subtask.dependencies {
            if !ids.contains(dep.as_str()) {
                return Err(GraphError(format!(
                    "subtask '{}' depends on unknown id '{}'",
                    subtask.id, dep
                )));
            }
        }
    }

    let edges: HashMap<&str, &Vec<String>> = output
        .subtasks
        .iter()
        .map(|s| (s.id.as_str(), &s.dependencies))
        .collect();
    if let Some(cycle) = detect_cycle(&edges) {
        return Err(GraphError(format!(
            "Circular dependency detected: {}",
            cycle.join(" -> ")
        )));
    }

    let mut seen_in_step: HashSet<&str> = HashSet::new();
    for step in &output.execution_plan.steps {
        for subtask_id in &step.subtask_ids {
            if !ids.contains(subtask_id.as_str()) {
                return Err(GraphError(format!(
                    "step references unknown subtask id '{subtask_id}'"
                )));
            }
            if !seen_in_step.insert(subtask_id.as_str()) {
                return Err(GraphError(format!(
                    "subtask id '{subtask_id}' appears in more than one step"
                )));
            }
        }
    }

    let mut warnings = GraphWarnings::default();
    if output.estimated_total_minutes > 0.0 {
        let sum: f64 = output.subtasks.iter().map(|s| s.estimated_minutes).sum();
        let total = output.estimated_total_minutes;
        if (sum - total).abs() > 0.5 * total {
            warnings.estimate_sum_mismatch = Some(format!(
                "sum(estimatedMinutes)={sum} differs from estimatedTotalMinutes={total} by more than 50%"
            ));
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{RawExecutionPlan, RawStep, RawSubtask};

    fn subtask(id: &str, deps: &[&str]) -> RawSubtask {
        RawSubtask {
            id: id.to_string(),
            objective: "do it".to_string(),
            constraints: Vec::new(),
            estimated_minutes: 5.0,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn plan(subtasks: Vec<RawSubtask>, steps: Vec<RawStep>) -> PlanningOutput {
        PlanningOutput {
            reasoning: "r".to_string(),
            subtasks,
            execution_plan: RawExecutionPlan {
                is_parallel: false,
                steps,
            },
            estimated_total_minutes: 0.0,
            complexity_score: 3.0,
        }
    }

    #[test]
    fn accepts_acyclic_dag() {
        let plan = plan(
            vec![subtask("a", &[]), subtask("b", &["a"])],
            vec![
                RawStep { order: 1.0, subtask_ids: vec!["a".into()], parallel: false },
                RawStep { order: 2.0, subtask_ids: vec!["b".into()], parallel: false },
            ],
        );
        assert!(validate_graph(&plan).is_ok());
    }

    #[test]
    fn rejects_two_cycle() {
        let plan = plan(
            vec![subtask("a", &["b"]), subtask("b", &["a"])],
            vec![RawStep { order: 1.0, subtask_ids: vec!["a".into(), "b".into()], parallel: true }],
        );
        let err = validate_graph(&plan).unwrap_err();
        assert!(err.0.contains("Circular dependency"));
    }

    #[test]
    fn rejects_self_dependency() {
        let plan = plan(
            vec![subtask("a", &["a"])],
            vec![RawStep { order: 1.0, subtask_ids: vec!["a".into()], parallel: false }],
        );
        let err = validate_graph(&plan).unwrap_err();
        assert!(err.0.contains("depend on itself"));
    }

    #[test]
    fn rejects_subtask_id_duplicated_across_steps() {
        let plan = plan(
            vec![subtask("a", &[])],
            vec![
                RawStep { order: 1.0, subtask_ids: vec!["a".into()], parallel: false },
                RawStep { order: 2.0, subtask_ids: vec!["a".into()], parallel: false },
            ],
        );
        let err = validate_graph(&plan).unwrap_err();
        assert!(err.0.contains("more than one step"));
    }

    #[test]
    fn warns_when_estimate_sum_diverges() {
        let mut plan = plan(
            vec![subtask("a", &[])],
            vec![RawStep { order: 1.0, subtask_ids: vec!["a".into()], parallel: false }],
        );
        plan.estimated_total_minutes = 100.0;
        let warnings = validate_graph(&plan).unwrap();
        assert!(warnings.estimate_sum_mismatch.is_some());
    }
}
