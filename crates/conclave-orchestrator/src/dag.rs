//! Run-time re-validation of a `PlannerOutput`'s dependency graph. The
//! planner's own output already passed this check at parse time (see
//! `conclave_parser::validate_graph`); this is the same grey/black DFS
//! applied to the typed domain model, run again immediately before
//! dispatch in case a caller constructed or mutated a plan by hand.

use std::collections::{HashMap, HashSet};

use conclave_types::PlannerOutput;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

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

/// Dependencies reference existing ids, no self-loop, no cycle, steps cover
/// disjoint id sets, all step ids exist.
pub fn validate_plan_dag(plan: &PlannerOutput) -> Result<(), String> {
    let ids: HashSet<&str> = plan.subtasks.iter().map(|s| s.id.as_str()).collect();

    for subtask in &plan.subtasks {
        if subtask.dependencies.iter().any(|d| d == &subtask.id) {
            return Err(format!("subtask '{}' may not depend on itself", subtask.id));
        }
        for dep in &subtask.dependencies {
            if !ids.contains(dep.as_str()) {
                return Err(format!(
                    "subtask '{}' depends on unknown id '{}'",
                    subtask.id, dep
                ));
            }
        }
    }

    let edges: HashMap<&str, &Vec<String>> = plan
        .subtasks
        .iter()
        .map(|s| (s.id.as_str(), &s.dependencies))
        .collect();
    if let Some(cycle) = detect_cycle(&edges) {
        return Err(format!("Circular dependency detected: {}", cycle.join(" -> ")));
    }

    let mut seen_in_step: HashSet<&str> = HashSet::new();
    for step in &plan.execution_plan.steps {
        for subtask_id in &step.subtask_ids {
            if !ids.contains(subtask_id.as_str()) {
                return Err(format!("step references unknown subtask id '{subtask_id}'"));
            }
            if !seen_in_step.insert(subtask_id.as_str()) {
                return Err(format!("subtask id '{subtask_id}' appears in more than one step"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{
        DelegationConfig, DelegationMode, ExecutionPlan, ExecutionStep, RetryPolicy, SubTask,
    };

    fn plan_with(subtasks: Vec<SubTask>, steps: Vec<ExecutionStep>) -> PlannerOutput {
        PlannerOutput {
            task_id: "t1".to_string(),
            subtasks,
            delegation: DelegationConfig {
                mode: DelegationMode::Communication,
                worker_count: 1,
                timeout_ms: 1000,
                retry_policy: RetryPolicy::default(),
            },
            execution_plan: ExecutionPlan {
                steps,
                is_parallel: false,
            },
            reasoning: None,
            total_duration_estimate_ms: None,
            token_estimate: None,
        }
    }

    #[test]
    fn accepts_acyclic_disjoint_plan() {
        let a = SubTask::new("a", "t1", "do a");
        let mut b = SubTask::new("b", "t1", "do b");
        b.dependencies = vec!["a".to_string()];
        let plan = plan_with(
            vec![a, b],
            vec![
                ExecutionStep { order: 1, subtask_ids: vec!["a".into()], parallel: false },
                ExecutionStep { order: 2, subtask_ids: vec!["b".into()], parallel: false },
            ],
        );
        assert!(validate_plan_dag(&plan).is_ok());
    }

    #[test]
    fn rejects_cycle() {
        let mut a = SubTask::new("a", "t1", "do a");
        a.dependencies = vec!["b".to_string()];
        let mut b = SubTask::new("b", "t1", "do b");
        b.dependencies = vec!["a".to_string()];
        let plan = plan_with(
            vec![a, b],
            vec![ExecutionStep { order: 1, subtask_ids: vec!["a".into(), "b".into()], parallel: true }],
        );
        let err = validate_plan_dag(&plan).unwrap_err();
        assert!(err.contains("Circular dependency"));
    }

    #[test]
    fn rejects_subtask_id_duplicated_across_steps() {
        let a = SubTask::new("a", "t1", "do a");
        let plan = plan_with(
            vec![a],
            vec![
                ExecutionStep { order: 1, subtask_ids: vec!["a".into()], parallel: false },
                ExecutionStep { order: 2, subtask_ids: vec!["a".into()], parallel: false },
            ],
        );
        let err = validate_plan_dag(&plan).unwrap_err();
        assert!(err.contains("more than one step"));
    }
}
