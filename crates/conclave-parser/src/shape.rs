//! Raw JSON shape produced by the planner's completion, and structural
//! (non-referential) validation over it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSubtask {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: f64,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubtaskWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    objective: String,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    estimated_minutes: f64,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStep {
    #[serde(default)]
    pub order: f64,
    #[serde(default)]
    pub subtask_ids: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStepWire {
    #[serde(default)]
    order: f64,
    #[serde(default)]
    subtask_ids: Vec<String>,
    #[serde(default)]
    parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExecutionPlan {
    pub is_parallel: bool,
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExecutionPlanWire {
    is_parallel: bool,
    steps: Vec<RawStepWire>,
}

/// The planner's parsed-and-validated completion output. Field names mirror
/// the wire shape (camelCase in transit); this struct holds the snake_case
/// Rust-side view after shape validation has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningOutput {
    pub reasoning: String,
    pub subtasks: Vec<RawSubtask>,
    pub execution_plan: RawExecutionPlan,
    pub estimated_total_minutes: f64,
    pub complexity_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanningOutputWire {
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    subtasks: Option<Vec<RawSubtaskWire>>,
    #[serde(default)]
    execution_plan: Option<RawExecutionPlanWire>,
    #[serde(default)]
    estimated_total_minutes: Option<f64>,
    #[serde(default)]
    complexity_score: Option<f64>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ShapeError {
    pub field: String,
    pub message: String,
}

impl ShapeError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parses the candidate JSON text and validates the top-level and nested
/// shape constraints from the spec, citing a field path on first failure.
pub fn parse_and_validate_shape(candidate: &str) -> Result<PlanningOutput, ShapeError> {
    let value: serde_json::Value = serde_json::from_str(candidate)
        .map_err(|e| ShapeError::new("$", format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(ShapeError::new("$", "top-level value must be an object"));
    }
    let wire: PlanningOutputWire = serde_json::from_value(value)
        .map_err(|e| ShapeError::new("$", format!("does not match expected shape: {e}")))?;

    let reasoning = wire
        .reasoning
        .ok_or_else(|| ShapeError::new("reasoning", "must be present and a string"))?;

    let subtasks_wire = wire
        .subtasks
        .ok_or_else(|| ShapeError::new("subtasks", "must be an array"))?;

    let execution_plan_wire = wire
        .execution_plan
        .ok_or_else(|| ShapeError::new("executionPlan", "must be an object"))?;

    let estimated_total_minutes = wire
        .estimated_total_minutes
        .ok_or_else(|| ShapeError::new("estimatedTotalMinutes", "must be a number"))?;
    if estimated_total_minutes < 0.0 {
        return Err(ShapeError::new(
            "estimatedTotalMinutes",
            "must be >= 0",
        ));
    }

    let complexity_score = wire
        .complexity_score
        .ok_or_else(|| ShapeError::new("complexityScore", "must be a number"))?;
    if !(1.0..=10.0).contains(&complexity_score) {
        return Err(ShapeError::new("complexityScore", "must be in [1, 10]"));
    }

    let mut subtasks = Vec::with_capacity(subtasks_wire.len());
    for (i, s) in subtasks_wire.into_iter().enumerate() {
        if s.id.trim().is_empty() {
            return Err(ShapeError::new(format!("subtasks[{i}].id"), "must be non-empty"));
        }
        if s.objective.trim().is_empty() {
            return Err(ShapeError::new(
                format!("subtasks[{i}].objective"),
                "must be non-empty",
            ));
        }
        if s.estimated_minutes < 0.0 {
            return Err(ShapeError::new(
                format!("subtasks[{i}].estimatedMinutes"),
                "must be >= 0",
            ));
        }
        subtasks.push(RawSubtask {
            id: s.id,
            objective: s.objective,
            constraints: s.constraints,
            estimated_minutes: s.estimated_minutes,
            dependencies: s.dependencies,
        });
    }

    let mut steps = Vec::with_capacity(execution_plan_wire.steps.len());
    for (i, s) in execution_plan_wire.steps.into_iter().enumerate() {
        if s.order < 1.0 {
            return Err(ShapeError::new(
                format!("executionPlan.steps[{i}].order"),
                "must be >= 1",
            ));
        }
        if s.subtask_ids.is_empty() {
            return Err(ShapeError::new(
                format!("executionPlan.steps[{i}].subtaskIds"),
                "must be a non-empty array",
            ));
        }
        steps.push(RawStep {
            order: s.order,
            subtask_ids: s.subtask_ids,
            parallel: s.parallel,
        });
    }

    Ok(PlanningOutput {
        reasoning,
        subtasks,
        execution_plan: RawExecutionPlan {
            is_parallel: execution_plan_wire.is_parallel,
            steps,
        },
        estimated_total_minutes,
        complexity_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> &'static str {
        r#"{
            "reasoning": "split into two",
            "subtasks": [
                {"id": "subtask-1", "objective": "do A", "constraints": [], "estimatedMinutes": 10, "dependencies": []},
                {"id": "subtask-2", "objective": "do B", "constraints": [], "estimatedMinutes": 20, "dependencies": ["subtask-1"]}
            ],
            "executionPlan": {
                "isParallel": false,
                "steps": [
                    {"order": 1, "subtaskIds": ["subtask-1"], "parallel": false},
                    {"order": 2, "subtaskIds": ["subtask-2"], "parallel": false}
                ]
            },
            "estimatedTotalMinutes": 30,
            "complexityScore": 4
        }"#
    }

    #[test]
    fn accepts_well_formed_output() {
        let parsed = parse_and_validate_shape(valid_json()).unwrap();
        assert_eq!(parsed.subtasks.len(), 2);
        assert_eq!(parsed.execution_plan.steps.len(), 2);
    }

    #[test]
    fn rejects_empty_subtask_id() {
        let bad = valid_json().replace("\"subtask-1\", \"objective\"", "\"\", \"objective\"");
        let err = parse_and_validate_shape(&bad).unwrap_err();
        assert_eq!(err.field, "subtasks[0].id");
    }

    #[test]
    fn rejects_out_of_range_complexity_score() {
        let bad = valid_json().replace("\"complexityScore\": 4", "\"complexityScore\": 11");
        let err = parse_and_validate_shape(&bad).unwrap_err();
        assert_eq!(err.field, "complexityScore");
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = parse_and_validate_shape("[1, 2, 3]").unwrap_err();
        assert_eq!(err.field, "$");
    }
}
