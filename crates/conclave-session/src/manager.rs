use std::path::Path;

use chrono::Utc;
use conclave_core::Result;
use conclave_types::plan::PlannerOutput;
use conclave_types::session_records::{
    ActionRecord, ApprovalResponseFile, DecisionKind, DecisionRecord, InterventionFile,
    InterventionKind, MessageRecord, PendingApprovalFile, PlanFile, ProgressFile, SessionEvent,
    SessionEventType, SharedContextFile, ThinkingRecord, WorkerFileStatus, WorkerStatusFile,
};
use tokio::fs;
use tokio::sync::broadcast;

use crate::io::{append_jsonl, atomic_write_json, read_json_opt, read_jsonl_tail, remove_file_if_exists};
use crate::paths::SessionPaths;
use crate::watcher::SessionWatcher;

/// Materializes all cross-component state for one session on the local
/// filesystem and notifies observers of changes. See `initialize` for the
/// idempotent directory-seeding entrypoint.
pub struct SessionStore {
    session_id: String,
    paths: SessionPaths,
    watcher: SessionWatcher,
    poll_interval_ms: u64,
}

impl SessionStore {
    pub fn new(root_dir: impl AsRef<Path>, session_id: impl Into<String>, poll_interval_ms: u64) -> Self {
        let session_id = session_id.into();
        Self {
            paths: SessionPaths::new(root_dir, &session_id),
            session_id,
            watcher: SessionWatcher::new(),
            poll_interval_ms,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.watcher.subscribe()
    }

    /// Idempotently creates the directory tree and seeds `shared/context.json`
    /// with an empty context if absent.
    pub async fn initialize_session(&self) -> Result<()> {
        fs::create_dir_all(self.paths.orchestrator_dir()).await?;
        fs::create_dir_all(self.paths.workers_dir()).await?;
        fs::create_dir_all(self.paths.shared_dir()).await?;

        if read_json_opt::<SharedContextFile>(&self.paths.shared_context_file())
            .await?
            .is_none()
        {
            let seed = SharedContextFile {
                session_id: self.session_id.clone(),
                context: serde_json::Value::Object(serde_json::Map::new()),
                updated_at: Utc::now(),
            };
            atomic_write_json(&self.paths.shared_context_file(), &seed).await?;
        }
        Ok(())
    }

    /// Creates `workers/<id>/` and `workers/<id>/artifacts/`; writes an
    /// initial idle `status.json`. Idempotent: an existing status file is
    /// left untouched.
    pub async fn register_worker(&self, worker_id: &str) -> Result<()> {
        fs::create_dir_all(self.paths.worker_artifacts_dir(worker_id)).await?;
        let status_path = self.paths.worker_status_file(worker_id);
        if read_json_opt::<WorkerStatusFile>(&status_path).await?.is_none() {
            atomic_write_json(&status_path, &WorkerStatusFile::idle(worker_id)).await?;
        }
        Ok(())
    }

    pub async fn write_plan(&self, plan: &PlannerOutput) -> Result<()> {
        let file = PlanFile {
            session_id: self.session_id.clone(),
            plan: plan.clone(),
            updated_at: Utc::now(),
        };
        atomic_write_json(&self.paths.plan_file(), &file).await
    }

    pub async fn read_plan(&self) -> Result<Option<PlanFile>> {
        read_json_opt(&self.paths.plan_file()).await
    }

    pub async fn write_progress(&self, progress: &ProgressFile) -> Result<()> {
        atomic_write_json(&self.paths.progress_file(), progress).await?;
        self.emit(SessionEventType::ProgressUpdated, None, &self.paths.progress_file(), serde_json::Value::Null);
        Ok(())
    }

    pub async fn read_progress(&self) -> Result<Option<ProgressFile>> {
        read_json_opt(&self.paths.progress_file()).await
    }

    pub async fn append_decision(&self, record: &DecisionRecord) -> Result<()> {
        append_jsonl(&self.paths.decisions_file(), record).await
    }

    pub async fn read_decisions(&self, limit: Option<usize>) -> Result<Vec<DecisionRecord>> {
        read_jsonl_tail(&self.paths.decisions_file(), limit).await
    }

    pub async fn read_worker_status(&self, worker_id: &str) -> Result<Option<WorkerStatusFile>> {
        read_json_opt(&self.paths.worker_status_file(worker_id)).await
    }

    pub async fn write_worker_status(&self, worker_id: &str, status: &WorkerStatusFile) -> Result<()> {
        let path = self.paths.worker_status_file(worker_id);
        atomic_write_json(&path, status).await?;
        self.emit(SessionEventType::WorkerStatusChanged, Some(worker_id), &path, serde_json::Value::Null);
        Ok(())
    }

    pub async fn read_pending_approval(&self, worker_id: &str) -> Result<Option<PendingApprovalFile>> {
        read_json_opt(&self.paths.worker_pending_approval_file(worker_id)).await
    }

    pub async fn write_pending_approval(&self, worker_id: &str, approval: &PendingApprovalFile) -> Result<()> {
        let path = self.paths.worker_pending_approval_file(worker_id);
        atomic_write_json(&path, approval).await?;
        self.emit(SessionEventType::PendingApprovalCreated, Some(worker_id), &path, serde_json::Value::Null);
        Ok(())
    }

    /// Writes the response, deletes the corresponding `pending_approval.json`,
    /// emits `pending_approval_removed`, and auto-appends an `approval`
    /// decision record.
    pub async fn write_approval_response(&self, worker_id: &str, response: &ApprovalResponseFile) -> Result<()> {
        let response_path = self.paths.worker_approval_response_file(worker_id);
        atomic_write_json(&response_path, response).await?;
        remove_file_if_exists(&self.paths.worker_pending_approval_file(worker_id)).await?;
        self.emit(
            SessionEventType::PendingApprovalRemoved,
            Some(worker_id),
            &response_path,
            serde_json::Value::Null,
        );

        let summary = if response.approved {
            format!("approval granted for worker {worker_id}")
        } else {
            format!("approval denied for worker {worker_id}")
        };
        let mut record = DecisionRecord::new(DecisionKind::Approval, summary);
        record.data = serde_json::to_value(response).unwrap_or(serde_json::Value::Null);
        self.append_decision(&record).await
    }

    /// Writes `intervention.json` with a fresh id and `acknowledged=false`,
    /// emits `intervention_created`, and auto-appends an `intervention`
    /// decision.
    pub async fn write_intervention(&self, worker_id: &str, kind: InterventionKind, body: impl Into<String>) -> Result<InterventionFile> {
        let body = body.into();
        let intervention = InterventionFile::new(kind, body.clone());
        let path = self.paths.worker_intervention_file(worker_id);
        atomic_write_json(&path, &intervention).await?;
        self.emit(SessionEventType::InterventionCreated, Some(worker_id), &path, serde_json::Value::Null);

        let mut record = DecisionRecord::new(DecisionKind::Intervention, body);
        record.data = serde_json::to_value(&intervention).unwrap_or(serde_json::Value::Null);
        self.append_decision(&record).await?;
        Ok(intervention)
    }

    pub async fn acknowledge_intervention(&self, worker_id: &str) -> Result<Option<InterventionFile>> {
        let path = self.paths.worker_intervention_file(worker_id);
        let Some(mut intervention) = read_json_opt::<InterventionFile>(&path).await? else {
            return Ok(None);
        };
        intervention.acknowledged = true;
        atomic_write_json(&path, &intervention).await?;
        self.emit(SessionEventType::InterventionAcknowledged, Some(worker_id), &path, serde_json::Value::Null);
        Ok(Some(intervention))
    }

    pub async fn append_thinking(&self, worker_id: &str, record: &ThinkingRecord) -> Result<()> {
        let path = self.paths.worker_thinking_file(worker_id);
        append_jsonl(&path, record).await?;
        self.emit(SessionEventType::ThinkingUpdated, Some(worker_id), &path, serde_json::Value::Null);
        Ok(())
    }

    pub async fn read_thinking_logs(&self, worker_id: &str, limit: Option<usize>) -> Result<Vec<ThinkingRecord>> {
        read_jsonl_tail(&self.paths.worker_thinking_file(worker_id), limit).await
    }

    pub async fn append_action(&self, worker_id: &str, record: &ActionRecord) -> Result<()> {
        let path = self.paths.worker_actions_file(worker_id);
        append_jsonl(&path, record).await?;
        self.emit(SessionEventType::ActionCompleted, Some(worker_id), &path, serde_json::Value::Null);
        Ok(())
    }

    pub async fn read_action_logs(&self, worker_id: &str, limit: Option<usize>) -> Result<Vec<ActionRecord>> {
        read_jsonl_tail(&self.paths.worker_actions_file(worker_id), limit).await
    }

    pub async fn read_shared_context(&self) -> Result<Option<SharedContextFile>> {
        read_json_opt(&self.paths.shared_context_file()).await
    }

    /// Session id is auto-stamped regardless of what the caller passed in
    /// `ctx.session_id`.
    pub async fn write_shared_context(&self, context: serde_json::Value) -> Result<()> {
        let file = SharedContextFile {
            session_id: self.session_id.clone(),
            context,
            updated_at: Utc::now(),
        };
        atomic_write_json(&self.paths.shared_context_file(), &file).await
    }

    pub async fn append_message(&self, message: &MessageRecord) -> Result<()> {
        append_jsonl(&self.paths.messages_file(), message).await
    }

    pub async fn read_messages(&self, limit: Option<usize>) -> Result<Vec<MessageRecord>> {
        read_jsonl_tail(&self.paths.messages_file(), limit).await
    }

    pub fn start_watching(&mut self) {
        let root = self.paths.root().to_path_buf();
        self.watcher.start(&root, self.poll_interval_ms);
    }

    pub fn stop_watching(&mut self) {
        self.watcher.stop();
    }

    /// Recursive removal of the session tree.
    pub async fn cleanup(&self) -> Result<()> {
        match fs::remove_dir_all(self.paths.root()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stops watching and drops observers.
    pub fn close(&mut self) {
        self.stop_watching();
    }

    fn emit(&self, event_type: SessionEventType, worker_id: Option<&str>, path: &Path, data: serde_json::Value) {
        self.watcher.emit(SessionEvent {
            event_type,
            session_id: self.session_id.clone(),
            worker_id: worker_id.map(|s| s.to_string()),
            file_path: path.to_string_lossy().to_string(),
            data,
            timestamp: Utc::now(),
        });
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::delegation::{DelegationConfig, DelegationMode, RetryPolicy};
    use conclave_types::plan::{ExecutionPlan, PlannerOutput};

    fn sample_plan() -> PlannerOutput {
        PlannerOutput {
            task_id: "t1".to_string(),
            subtasks: Vec::new(),
            delegation: DelegationConfig {
                mode: DelegationMode::Communication,
                worker_count: 1,
                timeout_ms: 1000,
                retry_policy: RetryPolicy::default(),
            },
            execution_plan: ExecutionPlan {
                is_parallel: false,
                steps: Vec::new(),
            },
            reasoning: Some("because".to_string()),
            total_duration_estimate_ms: None,
            token_estimate: None,
        }
    }

    #[tokio::test]
    async fn initialize_session_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "session-1", 500);
        store.initialize_session().await.unwrap();
        store.initialize_session().await.unwrap();
        let ctx = store.read_shared_context().await.unwrap().unwrap();
        assert_eq!(ctx.session_id, "session-1");
    }

    #[tokio::test]
    async fn register_worker_seeds_idle_status_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "session-1", 500);
        store.initialize_session().await.unwrap();
        store.register_worker("w1").await.unwrap();
        let status = store.read_worker_status("w1").await.unwrap().unwrap();
        assert_eq!(status.status, WorkerFileStatus::Idle);

        store
            .write_worker_status(
                "w1",
                &WorkerStatusFile {
                    worker_id: "w1".to_string(),
                    status: WorkerFileStatus::Running,
                    progress: 0.5,
                    last_heartbeat: Utc::now(),
                    message: None,
                },
            )
            .await
            .unwrap();
        store.register_worker("w1").await.unwrap();
        let status = store.read_worker_status("w1").await.unwrap().unwrap();
        assert_eq!(status.status, WorkerFileStatus::Running);
    }

    #[tokio::test]
    async fn write_plan_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "session-1", 500);
        store.initialize_session().await.unwrap();
        store.write_plan(&sample_plan()).await.unwrap();
        let plan = store.read_plan().await.unwrap().unwrap();
        assert_eq!(plan.plan.reasoning.as_deref(), Some("because"));
    }

    #[tokio::test]
    async fn approval_response_deletes_pending_and_appends_decision() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "session-1", 500);
        store.initialize_session().await.unwrap();
        store.register_worker("w1").await.unwrap();
        store
            .write_pending_approval(
                "w1",
                &PendingApprovalFile {
                    id: "a1".to_string(),
                    worker_id: "w1".to_string(),
                    summary: "deploy?".to_string(),
                    data: serde_json::Value::Null,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(store.read_pending_approval("w1").await.unwrap().is_some());

        store
            .write_approval_response(
                "w1",
                &ApprovalResponseFile {
                    id: "a1".to_string(),
                    approved: true,
                    note: None,
                    responded_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        assert!(store.read_pending_approval("w1").await.unwrap().is_none());
        let decisions = store.read_decisions(None).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, DecisionKind::Approval);
    }

    #[tokio::test]
    async fn cleanup_removes_the_session_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "session-1", 500);
        store.initialize_session().await.unwrap();
        store.cleanup().await.unwrap();
        assert!(!store.paths.root().exists());
    }
}
