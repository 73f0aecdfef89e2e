//! Task, handle and group types shared by backends and the engine.

use crate::error::{is_content_policy, GenFlowError, PARTIAL_FAILURE_MESSAGE};
use crate::registry::{Category, Params, ProviderKind, SubmissionStyle};
use crate::request::GenerationInput;
use crate::task::status::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vendor error attached to a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Vendor error code, if the provider sent one.
    pub code: Option<String>,
    /// Human-readable explanation.
    pub message: String,
}

impl TaskError {
    /// Creates an error; an empty code counts as none.
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.filter(|c| !c.is_empty()),
            message: message.into(),
        }
    }

    /// Rewrites a content-safety rejection into the same explanation a
    /// rejected submission carries.
    pub(crate) fn clarified(self) -> Self {
        let code = self.code.as_deref().unwrap_or_default();
        if !is_content_policy(code, &self.message) {
            return self;
        }
        let err = GenFlowError::provider(None, code, self.message);
        Self::new(err.code().map(str::to_string), err.user_message())
    }

    /// Returns true if the error carries a vendor code or a message.
    pub fn is_specific(&self) -> bool {
        self.code.is_some() || !self.message.trim().is_empty()
    }
}

impl From<&GenFlowError> for TaskError {
    fn from(err: &GenFlowError) -> Self {
        Self::new(err.code().map(str::to_string), err.user_message())
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Point-in-time view of a remote task, as reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Canonical status.
    pub status: TaskStatus,
    /// Result artifacts, present once SUCCEEDED.
    #[serde(default)]
    pub artifact_urls: Vec<String>,
    /// Text output of completion models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set when FAILED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskSnapshot {
    /// Queued, not started.
    pub fn pending() -> Self {
        Self::with_status(TaskStatus::Pending)
    }

    /// In progress.
    pub fn running() -> Self {
        Self::with_status(TaskStatus::Running)
    }

    /// Not-yet-terminal snapshot with the given status.
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            artifact_urls: Vec::new(),
            text: None,
            error: None,
        }
    }

    /// Finished with artifact URLs.
    pub fn succeeded(artifact_urls: Vec<String>) -> Self {
        Self {
            artifact_urls,
            ..Self::with_status(TaskStatus::Succeeded)
        }
    }

    /// Finished with a text completion.
    pub fn succeeded_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::with_status(TaskStatus::Succeeded)
        }
    }

    /// Failed with a vendor error.
    pub fn failed(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(TaskError::new(code, message)),
            ..Self::with_status(TaskStatus::Failed)
        }
    }
}

/// Canonical handle returned by submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Opaque provider task id.
    pub task_id: String,
    /// Model the task runs on.
    pub model: String,
    /// Vendor that owns the task.
    pub provider: ProviderKind,
    /// Style the task was submitted with.
    pub style: SubmissionStyle,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Final outcome for blocking submissions; `None` while the task runs remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskSnapshot>,
}

impl TaskHandle {
    /// Handle for a task that is still running remotely.
    pub fn remote(
        task_id: impl Into<String>,
        model: impl Into<String>,
        provider: ProviderKind,
        style: SubmissionStyle,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            model: model.into(),
            provider,
            style,
            submitted_at: Utc::now(),
            outcome: None,
        }
    }

    /// Handle whose outcome is already known.
    pub fn finished(mut self, outcome: TaskSnapshot) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Returns true if the outcome is already terminal.
    pub fn is_terminal(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| o.status.is_terminal())
    }
}

/// One remote job as tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    /// `None` when the submission itself was rejected.
    pub handle: Option<TaskHandle>,
    /// Current canonical status.
    pub status: TaskStatus,
    /// Seed sent with the request.
    pub seed: Option<i64>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last status request.
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Artifact URLs, durable once persisted.
    #[serde(default)]
    pub artifact_urls: Vec<String>,
    /// Text output of text models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// Set once artifacts went through the persistence handoff.
    #[serde(default)]
    pub persisted: bool,
}

impl GenerationTask {
    /// Tracks a submitted task, adopting the outcome of blocking handles.
    pub fn submitted(handle: TaskHandle, seed: Option<i64>) -> Self {
        let mut task = Self {
            status: TaskStatus::Pending,
            seed,
            created_at: handle.submitted_at,
            last_polled_at: None,
            artifact_urls: Vec::new(),
            text: None,
            error: None,
            persisted: false,
            handle: None,
        };
        if let Some(outcome) = handle.outcome.clone() {
            task.apply(outcome);
        }
        task.handle = Some(handle);
        task
    }

    /// Records a submission that never reached the provider's queue.
    pub fn rejected(seed: Option<i64>, err: &GenFlowError) -> Self {
        Self {
            handle: None,
            status: TaskStatus::Failed,
            seed,
            created_at: Utc::now(),
            last_polled_at: None,
            artifact_urls: Vec::new(),
            text: None,
            error: Some(err.into()),
            persisted: false,
        }
    }

    /// Provider task id, absent for rejected submissions.
    pub fn task_id(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.task_id.as_str())
    }

    /// Returns true once SUCCEEDED or FAILED.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a backend snapshot. Terminal tasks are never moved again.
    pub fn apply(&mut self, snapshot: TaskSnapshot) {
        if self.is_finished() {
            return;
        }
        self.status = snapshot.status;
        if !snapshot.artifact_urls.is_empty() {
            self.artifact_urls = snapshot.artifact_urls;
        }
        if snapshot.text.is_some() {
            self.text = snapshot.text;
        }
        if snapshot.status == TaskStatus::Failed {
            self.error = Some(
                snapshot
                    .error
                    .map(TaskError::clarified)
                    .unwrap_or_else(|| TaskError::new(None, String::new())),
            );
        }
    }

    /// Marks the task FAILED with the given error.
    pub fn fail(&mut self, err: &GenFlowError) {
        if self.is_finished() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(err.into());
    }

    /// First artifact, if any.
    pub fn artifact_url(&self) -> Option<&str> {
        self.artifact_urls.first().map(String::as_str)
    }
}

/// Aggregate state of a [`TaskGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    /// At least one member is unfinished.
    Processing,
    /// Every member succeeded.
    Succeeded,
    /// Every member finished and one or more failed.
    Failed,
}

impl GroupStatus {
    /// Returns true unless PROCESSING.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "PROCESSING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of one group-level status request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Aggregate status.
    pub status: GroupStatus,
    /// Member `i`'s first artifact at position `i`.
    pub artifacts: Vec<Option<String>>,
    /// Member `i`'s text output at position `i`.
    pub texts: Vec<Option<String>>,
    /// Members that succeeded.
    pub succeeded: usize,
    /// Members that failed.
    pub failed: usize,
    /// Group size.
    pub total: usize,
    /// Set when the group FAILED.
    pub error: Option<String>,
}

impl GroupReport {
    /// Aggregates member states.
    ///
    /// SUCCEEDED iff every member succeeded; FAILED iff every member finished
    /// and at least one failed; PROCESSING otherwise. A failed group carries
    /// the first specific member error, or a generic message if none has one.
    pub fn from_members(members: &[GenerationTask]) -> Self {
        let total = members.len();
        let succeeded = members
            .iter()
            .filter(|m| m.status == TaskStatus::Succeeded)
            .count();
        let failed = members
            .iter()
            .filter(|m| m.status == TaskStatus::Failed)
            .count();

        let status = if succeeded + failed < total {
            GroupStatus::Processing
        } else if failed == 0 {
            GroupStatus::Succeeded
        } else {
            GroupStatus::Failed
        };

        let error = (status == GroupStatus::Failed).then(|| {
            members
                .iter()
                .filter_map(|m| m.error.as_ref())
                .find(|e| e.is_specific())
                .map(ToString::to_string)
                .unwrap_or_else(|| PARTIAL_FAILURE_MESSAGE.to_string())
        });

        Self {
            status,
            artifacts: members
                .iter()
                .map(|m| m.artifact_url().map(str::to_string))
                .collect(),
            texts: members.iter().map(|m| m.text.clone()).collect(),
            succeeded,
            failed,
            total,
            error,
        }
    }

    /// Artifacts that are already available, in member order.
    pub fn artifact_urls(&self) -> Vec<&str> {
        self.artifacts.iter().flatten().map(String::as_str).collect()
    }

    /// Converts a terminal report into its artifacts or a group error.
    pub fn into_result(self) -> crate::error::Result<Vec<String>> {
        match self.status {
            GroupStatus::Succeeded => Ok(self.artifacts.into_iter().flatten().collect()),
            GroupStatus::Failed => Err(GenFlowError::PartialGroupFailure {
                failed: self.failed,
                total: self.total,
                message: self
                    .error
                    .unwrap_or_else(|| PARTIAL_FAILURE_MESSAGE.to_string()),
            }),
            GroupStatus::Processing => Err(GenFlowError::Protocol(format!(
                "group still processing ({} of {} finished)",
                self.succeeded + self.failed,
                self.total
            ))),
        }
    }
}

/// What a caller asks for: N generations of one model with shared inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Category to validate inputs for.
    pub category: Category,
    /// Model id.
    pub model: String,
    /// Shared inputs.
    pub input: GenerationInput,
    /// Shared parameters.
    #[serde(default)]
    pub params: Params,
    /// Group size; members differ only by seed.
    pub count: usize,
    /// Owning project, used in durable storage keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl GenerationJob {
    /// Creates a single-member job.
    pub fn new(category: Category, model: impl Into<String>, input: GenerationInput) -> Self {
        Self {
            category,
            model: model.into(),
            input,
            params: Params::new(),
            count: 1,
            project: None,
        }
    }

    /// Sets the parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the number of parallel generations.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the project used in storage keys.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// A user-initiated batch of tasks sharing parameters except the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGroup {
    /// Group id.
    pub id: uuid::Uuid,
    /// Model id.
    pub model: String,
    /// Category of the job.
    pub category: Category,
    /// Project used in storage keys.
    pub project: Option<String>,
    /// Members, in submission order.
    pub members: Vec<GenerationTask>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Cached once the group reaches a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<GroupReport>,
}

impl TaskGroup {
    /// Groups submitted members of `job`.
    pub fn new(job: &GenerationJob, members: Vec<GenerationTask>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            model: job.model.clone(),
            category: job.category,
            project: job.project.clone(),
            members,
            created_at: Utc::now(),
            terminal: None,
        }
    }

    /// Current aggregate without contacting any provider.
    pub fn report(&self) -> GroupReport {
        match &self.terminal {
            Some(report) => report.clone(),
            None => GroupReport::from_members(&self.members),
        }
    }

    /// Aggregate status right now.
    pub fn status(&self) -> GroupStatus {
        self.report().status
    }

    /// Returns true once the terminal state has been recorded.
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}
