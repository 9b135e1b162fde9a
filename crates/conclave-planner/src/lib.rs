//! Planner (C4): turns a `Task` into a validated `PlannerOutput` by
//! prompting a Completer, parsing its response (C3), and deriving a
//! delegation plan from the parsed shape and the task's complexity.

use conclave_parser::{parse_with_retry, PlanningOutput};
use conclave_providers::{ChatMessage, Completer, CompleterRequest, MessageRole};
use conclave_types::{
    Complexity, DelegationConfig, DelegationMode, ExecutionPlan, ExecutionStep, Priority,
    RetryPolicy, SubTask, Task,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_MAX_SUBTASKS: u32 = 10;
const MIN_SUBTASKS: u32 = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConstraints {
    pub max_token_budget: Option<u64>,
    pub max_execution_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub prefer_parallel: Option<bool>,
    pub conservative_mode: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PlanInput {
    pub task: Task,
    pub available_tools: Option<Vec<String>>,
    pub context_constraints: Option<ContextConstraints>,
    pub max_subtasks: Option<u32>,
    pub preferences: Option<Preferences>,
}

impl PlanInput {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            available_tools: None,
            context_constraints: None,
            max_subtasks: None,
            preferences: None,
        }
    }
}

/// A worker count and timeout to fall back on when the parsed plan has no
/// duration estimates to derive them from.
#[derive(Debug, Clone)]
pub struct DefaultDelegationConfig {
    pub worker_count: u32,
    pub timeout_ms: u64,
}

impl Default for DefaultDelegationConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub default_delegation: DefaultDelegationConfig,
    pub max_parse_retries: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_delegation: DefaultDelegationConfig::default(),
            max_parse_retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanResult {
    pub success: bool,
    pub output: Option<conclave_types::PlannerOutput>,
    pub error: Option<String>,
    pub tokens_used: u64,
    pub retry_count: u32,
    pub degraded: bool,
}

enum PlanFailure {
    Retryable(String),
    Fatal(String),
}

struct PlanAttempt {
    outcome: Result<conclave_types::PlannerOutput, PlanFailure>,
    tokens_used: u64,
    retry_count: u32,
}

fn build_system_prompt() -> String {
    "You are a task decomposition planner. Break the given objective into an \
     ordered set of independent or dependent sub-tasks that a pool of \
     workers can execute. Respond with JSON only, matching exactly this \
     shape:\n\
     {\n\
     \x20\"reasoning\": string,\n\
     \x20\"subtasks\": [{\"id\": string, \"objective\": string, \"constraints\": string[], \"estimatedMinutes\": number, \"dependencies\": string[]}],\n\
     \x20\"executionPlan\": {\"isParallel\": boolean, \"steps\": [{\"order\": number, \"subtaskIds\": string[], \"parallel\": boolean}]},\n\
     \x20\"estimatedTotalMinutes\": number,\n\
     \x20\"complexityScore\": number (1-10)\n\
     }\n\
     Every sub-task id referenced in a step or as a dependency must exist in \
     `subtasks`. A sub-task may not depend on itself. The dependency graph \
     must be acyclic. No sub-task id may appear in more than one step."
        .to_string()
}

fn build_user_prompt(input: &PlanInput, complexity: Complexity, priority: Priority) -> String {
    let mut prompt = format!("Objective: {}\n", input.task.objective);

    prompt.push_str("Constraints:\n");
    if input.task.constraints.is_empty() {
        prompt.push_str("  none\n");
    } else {
        for (i, c) in input.task.constraints.iter().enumerate() {
            prompt.push_str(&format!("  {}. {}\n", i + 1, c));
        }
    }

    if let Some(tools) = &input.available_tools {
        if !tools.is_empty() {
            prompt.push_str(&format!("Available tools: {}\n", tools.join(", ")));
        }
    }

    if let Some(max) = input.max_subtasks {
        prompt.push_str(&format!("Produce at most {max} sub-tasks.\n"));
    }

    prompt.push_str(&format!(
        "Priority: {priority:?}\nComplexity: {complexity:?}\n",
    ));
    if let Some(prefs) = &input.preferences {
        if prefs.prefer_parallel == Some(true) {
            prompt.push_str("Prefer a parallel execution plan where dependencies allow it.\n");
        }
        if prefs.conservative_mode == Some(true) {
            prompt.push_str("Conservative mode: favor fewer, larger sub-tasks over many small ones.\n");
        }
    }

    prompt.push_str(
        "Example shape: {\"reasoning\":\"...\",\"subtasks\":[{\"id\":\"subtask-1\",\
         \"objective\":\"...\",\"constraints\":[],\"estimatedMinutes\":10,\"dependencies\":[]}],\
         \"executionPlan\":{\"isParallel\":false,\"steps\":[{\"order\":1,\"subtaskIds\":[\"subtask-1\"],\"parallel\":false}]},\
         \"estimatedTotalMinutes\":10,\"complexityScore\":3}",
    );

    prompt
}

fn to_subtask(raw: &conclave_parser::RawSubtask, parent_task_id: &str) -> SubTask {
    let mut subtask = SubTask::new(raw.id.clone(), parent_task_id.to_string(), raw.objective.clone());
    subtask.constraints = raw.constraints.clone();
    subtask.estimated_duration_ms = minutes_to_ms(raw.estimated_minutes);
    subtask.dependencies = raw.dependencies.clone();
    subtask
}

fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * 60_000.0).round().max(0.0) as u64
}

fn to_execution_plan(raw: &conclave_parser::RawExecutionPlan) -> ExecutionPlan {
    ExecutionPlan {
        is_parallel: raw.is_parallel,
        steps: raw
            .steps
            .iter()
            .map(|s| ExecutionStep {
                order: s.order.round().max(0.0) as u32,
                subtask_ids: s.subtask_ids.clone(),
                parallel: s.parallel,
            })
            .collect(),
    }
}

fn derive_delegation(
    parsed: &PlanningOutput,
    complexity: Complexity,
    context_constraints: Option<&ContextConstraints>,
    defaults: &DefaultDelegationConfig,
) -> DelegationConfig {
    let worker_count: u32 = if !parsed.execution_plan.is_parallel {
        1
    } else {
        let factor = match complexity {
            Complexity::Complex => 0.5,
            Complexity::Moderate => 0.7,
            Complexity::Simple => 1.0,
        };
        let raw = (parsed.subtasks.len() as f64 * factor).ceil() as u32;
        raw.clamp(1, 3 * defaults.worker_count)
    };

    let sum_estimated_ms: u64 = parsed
        .subtasks
        .iter()
        .map(|s| minutes_to_ms(s.estimated_minutes))
        .sum();

    let mut timeout_ms: u64 = if sum_estimated_ms > 0 {
        ((1.5 * sum_estimated_ms as f64).round() as u64).max(defaults.timeout_ms)
    } else {
        let multiplier = match complexity {
            Complexity::Simple => 1,
            Complexity::Moderate => 2,
            Complexity::Complex => 3,
        };
        defaults.timeout_ms * multiplier
    };

    if let Some(cap) = context_constraints.and_then(|c| c.max_execution_time_ms) {
        timeout_ms = timeout_ms.min(cap);
    }

    DelegationConfig {
        mode: DelegationMode::Communication,
        worker_count,
        timeout_ms,
        retry_policy: RetryPolicy::default(),
    }
}

fn build_plan_output(
    input: &PlanInput,
    complexity: Complexity,
    parsed: PlanningOutput,
    config: &PlannerConfig,
) -> conclave_types::PlannerOutput {
    let subtasks = parsed
        .subtasks
        .iter()
        .map(|s| to_subtask(s, &input.task.id))
        .collect();
    let execution_plan = to_execution_plan(&parsed.execution_plan);
    let delegation = derive_delegation(
        &parsed,
        complexity,
        input.context_constraints.as_ref(),
        &config.default_delegation,
    );
    let total_duration_estimate_ms = if parsed.estimated_total_minutes > 0.0 {
        Some(minutes_to_ms(parsed.estimated_total_minutes))
    } else {
        None
    };

    conclave_types::PlannerOutput {
        task_id: input.task.id.clone(),
        subtasks,
        delegation,
        execution_plan,
        reasoning: Some(parsed.reasoning),
        total_duration_estimate_ms,
        token_estimate: None,
    }
}

async fn plan_once(
    completer: &dyn Completer,
    config: &PlannerConfig,
    input: &PlanInput,
    complexity: Complexity,
    priority: Priority,
) -> PlanAttempt {
    let system_prompt = build_system_prompt();
    let user_prompt = build_user_prompt(input, complexity, priority);
    let request = CompleterRequest {
        system_prompt: Some(system_prompt),
        messages: vec![ChatMessage {
            role: MessageRole::User,
            content: user_prompt,
        }],
        max_tokens: input
            .context_constraints
            .as_ref()
            .and_then(|c| c.max_token_budget)
            .map(|t| t as u32),
        temperature: None,
        stop_sequences: Vec::new(),
        cancel_signal: None,
    };

    match completer.complete(request.clone()).await {
        Ok(response) => {
            let initial_tokens = response.usage.input_tokens + response.usage.output_tokens;
            let retry_result =
                parse_with_retry(completer, &response.content, Some(&request), config.max_parse_retries)
                    .await;
            let tokens_used = initial_tokens + retry_result.total_tokens;
            match retry_result.result {
                Ok(parsed) => PlanAttempt {
                    outcome: Ok(build_plan_output(input, complexity, parsed.output, config)),
                    tokens_used,
                    retry_count: retry_result.retry_count,
                },
                Err(failure) => PlanAttempt {
                    outcome: Err(PlanFailure::Fatal(format!(
                        "plan could not be parsed: {failure}"
                    ))),
                    tokens_used,
                    retry_count: retry_result.retry_count,
                },
            }
        }
        Err(completer_error) => {
            let outcome = if completer_error.retryable {
                Err(PlanFailure::Retryable(format!("completer error: {completer_error}")))
            } else {
                Err(PlanFailure::Fatal(format!("completer error: {completer_error}")))
            };
            PlanAttempt {
                outcome,
                tokens_used: 0,
                retry_count: 0,
            }
        }
    }
}

/// `plan(input) -> PlanResult`: prompts the Completer, parses its response,
/// and derives a delegation plan. On a retryable Completer failure, halves
/// `max_subtasks` (floor at 3), sets `conservative_mode`, and retries once.
pub async fn plan(completer: &dyn Completer, config: &PlannerConfig, input: PlanInput) -> PlanResult {
    let complexity = input.task.complexity.unwrap_or(Complexity::Moderate);
    let priority = input.task.priority.unwrap_or(Priority::Medium);

    let mut working_input = input;
    let mut degraded = false;
    let mut total_tokens: u64 = 0;
    let mut total_retries: u32 = 0;
    let mut degraded_once = false;

    loop {
        let attempt = plan_once(completer, config, &working_input, complexity, priority).await;
        total_tokens += attempt.tokens_used;
        total_retries += attempt.retry_count;

        match attempt.outcome {
            Ok(output) => {
                return PlanResult {
                    success: true,
                    output: Some(output),
                    error: None,
                    tokens_used: total_tokens,
                    retry_count: total_retries,
                    degraded,
                };
            }
            Err(PlanFailure::Fatal(message)) => {
                return PlanResult {
                    success: false,
                    output: None,
                    error: Some(message),
                    tokens_used: total_tokens,
                    retry_count: total_retries,
                    degraded,
                };
            }
            Err(PlanFailure::Retryable(message)) => {
                warn!(task_id = %working_input.task.id, %message, "planner completer call failed, considering degradation");
                if degraded_once {
                    return PlanResult {
                        success: false,
                        output: None,
                        error: Some(message),
                        tokens_used: total_tokens,
                        retry_count: total_retries,
                        degraded,
                    };
                }

                let current_max = working_input.max_subtasks.unwrap_or(DEFAULT_MAX_SUBTASKS);
                let halved = (current_max / 2).max(MIN_SUBTASKS);
                if halved >= current_max {
                    return PlanResult {
                        success: false,
                        output: None,
                        error: Some(message),
                        tokens_used: total_tokens,
                        retry_count: total_retries,
                        degraded,
                    };
                }

                working_input.max_subtasks = Some(halved);
                let prefs = working_input.preferences.get_or_insert_with(Preferences::default);
                prefs.conservative_mode = Some(true);
                degraded = true;
                degraded_once = true;
                debug!(task_id = %working_input.task.id, max_subtasks = halved, "retrying plan in conservative mode");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_providers::{CompleterError, MockCompleter};
    use conclave_types::TaskKind;

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            kind: TaskKind::Composite,
            objective: "build feature X".to_string(),
            constraints: vec!["use Y".to_string()],
            output_schema: None,
            priority: None,
            complexity: None,
        }
    }

    fn valid_plan_json() -> &'static str {
        r#"{
            "reasoning": "two steps",
            "subtasks": [
                {"id": "subtask-1", "objective": "a", "constraints": [], "estimatedMinutes": 10, "dependencies": []},
                {"id": "subtask-2", "objective": "b", "constraints": [], "estimatedMinutes": 10, "dependencies": ["subtask-1"]}
            ],
            "executionPlan": {
                "isParallel": false,
                "steps": [
                    {"order": 1, "subtaskIds": ["subtask-1"], "parallel": false},
                    {"order": 2, "subtaskIds": ["subtask-2"], "parallel": false}
                ]
            },
            "estimatedTotalMinutes": 20,
            "complexityScore": 3
        }"#
    }

    #[tokio::test]
    async fn plan_succeeds_on_first_valid_response() {
        let completer = MockCompleter::new("mock");
        completer.queue_response(valid_plan_json().to_string());

        let result = plan(&completer, &PlannerConfig::default(), PlanInput::new(task())).await;
        assert!(result.success);
        assert!(!result.degraded);
        let output = result.output.unwrap();
        assert_eq!(output.subtasks.len(), 2);
        assert_eq!(output.delegation.worker_count, 1);
        assert_eq!(output.delegation.mode, DelegationMode::Communication);
    }

    #[tokio::test]
    async fn plan_degrades_and_retries_once_on_retryable_failure() {
        let completer = MockCompleter::new("mock");
        completer.queue_response(valid_plan_json().to_string());
        completer.queue_error(CompleterError::retryable("mock", "rate_limited"));

        let mut input = PlanInput::new(task());
        input.max_subtasks = Some(10);
        let result = plan(&completer, &PlannerConfig::default(), input).await;
        assert!(result.success);
        assert!(result.degraded);
    }

    #[tokio::test]
    async fn plan_surfaces_fatal_completer_error() {
        let completer = MockCompleter::new("mock");
        completer.queue_error(CompleterError::fatal("mock", "invalid_api_key"));

        let result = plan(&completer, &PlannerConfig::default(), PlanInput::new(task())).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid_api_key"));
    }

    #[test]
    fn parallel_worker_count_uses_complexity_factor() {
        let parsed: PlanningOutput = {
            let candidate = conclave_parser::extract_json_candidate(
                &valid_plan_json().replace("\"isParallel\": false", "\"isParallel\": true"),
            );
            conclave_parser::parse_and_validate_shape(&candidate).unwrap()
        };
        let defaults = DefaultDelegationConfig::default();
        let delegation = derive_delegation(&parsed, Complexity::Simple, None, &defaults);
        assert_eq!(delegation.worker_count, 2);
    }
}
