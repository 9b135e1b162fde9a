//! Planning Parser (C3): turns a completer's free-form `content` string into
//! a validated `PlanningOutput`, with an optional feedback-driven retry loop
//! that re-invokes the Completer when parsing fails.

mod extract;
mod graph;
mod shape;

pub use extract::extract_json_candidate;
pub use graph::{validate_graph, GraphError, GraphWarnings};
pub use shape::{parse_and_validate_shape, PlanningOutput, RawExecutionPlan, RawStep, RawSubtask, ShapeError};

use conclave_providers::{ChatMessage, Completer, CompleterRequest, MessageRole};

const MAX_TRUNCATED_RAW_LEN: usize = 2000;

/// A successfully parsed and structurally validated plan, plus any
/// non-fatal warnings surfaced during graph validation.
#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub output: PlanningOutput,
    pub warnings: GraphWarnings,
}

/// A parse failure: a field path (when the failure is shape-level), a
/// message, and the raw content that was parsed, truncated for logging.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseFailure {
    pub field: Option<String>,
    pub message: String,
    pub raw: String,
}

pub type ParseOutcome = Result<ParsedPlan, ParseFailure>;

fn truncate_raw(content: &str) -> String {
    if content.len() <= MAX_TRUNCATED_RAW_LEN {
        content.to_string()
    } else {
        let mut truncated = content[..MAX_TRUNCATED_RAW_LEN].to_string();
        truncated.push_str("...");
        truncated
    }
}

/// Pure: extracts, shape-validates, and graph-validates `content`. Never
/// invokes a Completer.
pub fn parse(content: &str) -> ParseOutcome {
    let candidate = extract_json_candidate(content);

    let output = parse_and_validate_shape(&candidate).map_err(|e| ParseFailure {
        field: Some(e.field),
        message: e.message,
        raw: truncate_raw(content),
    })?;

    let warnings = validate_graph(&output).map_err(|e| ParseFailure {
        field: None,
        message: e.0,
        raw: truncate_raw(content),
    })?;

    Ok(ParsedPlan { output, warnings })
}

/// Result of `parse_with_retry`: the final parse outcome plus bookkeeping
/// accumulated across every retry attempt.
#[derive(Debug)]
pub struct ParseWithRetryResult {
    pub result: ParseOutcome,
    pub retry_count: u32,
    pub total_tokens: u64,
}

fn build_feedback_prompt(previous_raw: &str, failure: &ParseFailure, attempt: u32) -> String {
    let field = failure.field.as_deref().unwrap_or("(graph)");
    format!(
        "Your previous response could not be parsed as the required JSON plan.\n\
         Attempt: {attempt}\n\
         Error at `{field}`: {}\n\
         Your previous response was:\n{}\n\n\
         Reply again with corrected JSON only.",
        failure.message,
        truncate_raw(previous_raw),
    )
}

fn build_retry_request(original: Option<&CompleterRequest>, feedback_prompt: &str) -> CompleterRequest {
    CompleterRequest {
        system_prompt: original.and_then(|r| r.system_prompt.clone()),
        messages: vec![ChatMessage {
            role: MessageRole::User,
            content: feedback_prompt.to_string(),
        }],
        max_tokens: original.and_then(|r| r.max_tokens),
        temperature: Some(0.1),
        stop_sequences: original.map(|r| r.stop_sequences.clone()).unwrap_or_default(),
        cancel_signal: original.and_then(|r| r.cancel_signal.clone()),
    }
}

/// Re-invokes the Completer with a feedback prompt whenever `parse` fails,
/// up to `max_retries` times. Fatal Completer errors abort the loop
/// immediately; retryable ones consume an attempt and continue. Token usage
/// across every completion call is summed.
pub async fn parse_with_retry(
    completer: &dyn Completer,
    initial_content: &str,
    original_request: Option<&CompleterRequest>,
    max_retries: u32,
) -> ParseWithRetryResult {
    let mut content = initial_content.to_string();
    let mut retry_count: u32 = 0;
    let mut total_tokens: u64 = 0;

    loop {
        match parse(&content) {
            Ok(parsed) => {
                return ParseWithRetryResult {
                    result: Ok(parsed),
                    retry_count,
                    total_tokens,
                };
            }
            Err(failure) => {
                if retry_count >= max_retries {
                    return ParseWithRetryResult {
                        result: Err(failure),
                        retry_count,
                        total_tokens,
                    };
                }

                let feedback_prompt = build_feedback_prompt(&content, &failure, retry_count + 1);
                let request = build_retry_request(original_request, &feedback_prompt);

                match completer.complete(request).await {
                    Ok(response) => {
                        total_tokens += response.usage.input_tokens + response.usage.output_tokens;
                        content = response.content;
                        retry_count += 1;
                    }
                    Err(completer_error) => {
                        if completer_error.retryable {
                            retry_count += 1;
                            continue;
                        }
                        return ParseWithRetryResult {
                            result: Err(ParseFailure {
                                field: None,
                                message: format!("completer error: {completer_error}"),
                                raw: truncate_raw(&content),
                            }),
                            retry_count,
                            total_tokens,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_providers::MockCompleter;

    fn valid_json() -> &'static str {
        r#"{
            "reasoning": "split into two",
            "subtasks": [
                {"id": "subtask-1", "objective": "do A", "constraints": [], "estimatedMinutes": 10, "dependencies": []}
            ],
            "executionPlan": {
                "isParallel": false,
                "steps": [
                    {"order": 1, "subtaskIds": ["subtask-1"], "parallel": false}
                ]
            },
            "estimatedTotalMinutes": 10,
            "complexityScore": 2
        }"#
    }

    #[test]
    fn parse_accepts_fenced_valid_plan() {
        let content = format!("```json\n{}\n```", valid_json());
        let outcome = parse(&content).unwrap();
        assert_eq!(outcome.output.subtasks.len(), 1);
    }

    #[test]
    fn parse_rejects_cyclic_plan_with_circular_message() {
        let content = r#"{
            "reasoning": "x",
            "subtasks": [
                {"id": "a", "objective": "x", "constraints": [], "estimatedMinutes": 1, "dependencies": ["b"]},
                {"id": "b", "objective": "x", "constraints": [], "estimatedMinutes": 1, "dependencies": ["a"]}
            ],
            "executionPlan": {"isParallel": true, "steps": [{"order": 1, "subtaskIds": ["a", "b"], "parallel": true}]},
            "estimatedTotalMinutes": 0,
            "complexityScore": 2
        }"#;
        let failure = parse(content).unwrap_err();
        assert!(failure.message.contains("Circular dependency"));
    }

    #[tokio::test]
    async fn parse_with_retry_recovers_after_one_bad_response() {
        let completer = MockCompleter::new("mock");
        completer.queue_response(valid_json().to_string());

        let outcome = parse_with_retry(&completer, "not json at all", None, 2).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.retry_count, 1);
    }

    #[tokio::test]
    async fn parse_with_retry_gives_up_after_max_retries() {
        let completer = MockCompleter::new("mock");
        completer.queue_response("still not json".to_string());
        completer.queue_response("still not json".to_string());

        let outcome = parse_with_retry(&completer, "also not json", None, 2).await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.retry_count, 2);
    }
}
