use std::path::{Path, PathBuf};

use rand::Rng;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap()
}

/// `session-<base36(now)>-<6 base36 random>`.
pub fn generate_session_id(now_millis: u128) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| BASE36_ALPHABET[rng.gen_range(0..36)] as char)
        .collect();
    format!("session-{}-{}", to_base36(now_millis), suffix)
}

#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(root_dir: impl AsRef<Path>, session_id: &str) -> Self {
        Self {
            root: root_dir.as_ref().join("sessions").join(session_id),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn orchestrator_dir(&self) -> PathBuf {
        self.root.join("orchestrator")
    }

    pub fn plan_file(&self) -> PathBuf {
        self.orchestrator_dir().join("plan.json")
    }

    pub fn progress_file(&self) -> PathBuf {
        self.orchestrator_dir().join("progress.json")
    }

    pub fn decisions_file(&self) -> PathBuf {
        self.orchestrator_dir().join("decisions.jsonl")
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join("shared")
    }

    pub fn shared_context_file(&self) -> PathBuf {
        self.shared_dir().join("context.json")
    }

    pub fn messages_file(&self) -> PathBuf {
        self.shared_dir().join("messages.jsonl")
    }

    pub fn workers_dir(&self) -> PathBuf {
        self.root.join("workers")
    }

    pub fn worker_dir(&self, worker_id: &str) -> PathBuf {
        self.workers_dir().join(worker_id)
    }

    pub fn worker_artifacts_dir(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("artifacts")
    }

    pub fn worker_status_file(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("status.json")
    }

    pub fn worker_thinking_file(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("thinking.jsonl")
    }

    pub fn worker_actions_file(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("actions.jsonl")
    }

    pub fn worker_pending_approval_file(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("pending_approval.json")
    }

    pub fn worker_approval_response_file(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("approval_response.json")
    }

    pub fn worker_intervention_file(&self, worker_id: &str) -> PathBuf {
        self.worker_dir(worker_id).join("intervention.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_has_expected_shape() {
        let id = generate_session_id(1_700_000_000_000);
        assert!(id.starts_with("session-"));
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn worker_paths_nest_under_worker_id() {
        let paths = SessionPaths::new("/tmp/root", "session-abc-xyz123");
        assert_eq!(
            paths.worker_status_file("w1"),
            PathBuf::from("/tmp/root/sessions/session-abc-xyz123/workers/w1/status.json")
        );
    }
}
