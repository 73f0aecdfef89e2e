//! Task engine: group fan-out, client-driven polling, aggregation and the
//! timeout-bounded convenience waits.

use crate::config::EngineConfig;
use crate::error::{GenFlowError, Result};
use crate::registry::Registry;
use crate::request::{ProviderRequest, RequestBuilder};
use crate::storage::{PersistContext, Persistence};
use crate::task::backend::BackendSet;
use crate::task::status::TaskStatus;
use crate::task::types::{
    GenerationJob, GenerationTask, GroupReport, TaskGroup, TaskHandle, TaskSnapshot,
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;

/// Runs generation jobs against the configured backends.
///
/// The engine holds no per-job state: groups are owned by the caller and
/// refreshed on demand.
#[derive(Debug)]
pub struct TaskEngine {
    requests: RequestBuilder,
    backends: BackendSet,
    persistence: Persistence,
    config: EngineConfig,
}

impl TaskEngine {
    /// Creates an engine over an immutable registry.
    pub fn new(
        registry: Arc<Registry>,
        backends: BackendSet,
        persistence: Persistence,
        config: EngineConfig,
    ) -> Self {
        Self {
            requests: RequestBuilder::new(registry),
            backends,
            persistence,
            config,
        }
    }

    /// Registry requests are built from.
    pub fn registry(&self) -> &Registry {
        self.requests.registry()
    }

    /// Request builder shared by all jobs.
    pub fn requests(&self) -> &RequestBuilder {
        &self.requests
    }

    /// Polling and timeout settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submits one prepared request to its backend.
    pub async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle> {
        self.backends
            .get(request.provider, request.style)?
            .submit(request)
            .await
    }

    /// Fetches the canonical state of one task. Terminal blocking outcomes
    /// are answered without contacting the provider.
    pub async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot> {
        if let Some(outcome) = handle.outcome.as_ref().filter(|o| o.status.is_terminal()) {
            return Ok(outcome.clone());
        }
        self.backends
            .get(handle.provider, handle.style)?
            .poll(handle)
            .await
    }

    /// Validates the job and submits every member concurrently.
    ///
    /// Members whose submission fails are recorded as FAILED. If no member
    /// could be submitted, the first submission error is returned instead.
    pub async fn submit_group(&self, job: &GenerationJob) -> Result<TaskGroup> {
        if job.count > self.config.max_group_size {
            return Err(GenFlowError::invalid(format!(
                "group size {} exceeds the maximum of {}",
                job.count, self.config.max_group_size
            )));
        }
        let requests =
            self.requests
                .build_group(job.category, &job.model, &job.input, &job.params, job.count)?;
        let first = requests
            .first()
            .ok_or_else(|| GenFlowError::invalid("group size must be at least 1"))?;
        let backend = self.backends.get(first.provider, first.style)?;

        let outcomes = join_all(requests.iter().map(|r| backend.submit(r))).await;

        let mut members = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (request, outcome) in requests.iter().zip(outcomes) {
            match outcome {
                Ok(handle) => members.push(GenerationTask::submitted(handle, request.seed)),
                Err(e) => {
                    tracing::warn!(
                        model = %request.model,
                        seed = ?request.seed,
                        "submission failed: {e}"
                    );
                    members.push(GenerationTask::rejected(request.seed, &e));
                    first_error.get_or_insert(e);
                }
            }
        }
        if members.iter().all(|m| m.handle.is_none()) {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let mut group = TaskGroup::new(job, members);
        let context = persist_context(&group);
        join_all(group.members.iter_mut().map(|m| self.persist_task(m, &context))).await;

        tracing::info!(
            group_id = %group.id,
            model = %group.model,
            members = group.members.len(),
            "submitted task group"
        );
        // blocking groups are finished on arrival
        self.record_terminal(&mut group);
        Ok(group)
    }

    /// One group-level status request.
    ///
    /// Polls every unfinished member concurrently; a failed poll marks only
    /// that member FAILED. Terminal groups are answered from the cached
    /// report without contacting any provider.
    pub async fn refresh(&self, group: &mut TaskGroup) -> GroupReport {
        if let Some(report) = &group.terminal {
            return report.clone();
        }

        let context = persist_context(group);
        join_all(
            group
                .members
                .iter_mut()
                .filter(|m| !m.is_finished())
                .map(|m| self.refresh_task(m, &context)),
        )
        .await;

        self.record_terminal(group)
    }

    /// Refreshes `group` every poll interval until it is terminal.
    ///
    /// Exceeding the wait budget marks every unfinished member FAILED, records
    /// the group as FAILED and returns [`GenFlowError::Timeout`].
    pub async fn wait(&self, group: &mut TaskGroup) -> Result<GroupReport> {
        let budget = self.config.wait_timeout;
        let interval = self.config.poll_interval;
        let start = Instant::now();

        let waited = tokio::time::timeout(budget, async {
            loop {
                let report = self.refresh(group).await;
                if report.status.is_terminal() {
                    return report;
                }
                tracing::debug!(
                    group_id = %group.id,
                    finished = report.succeeded + report.failed,
                    total = report.total,
                    elapsed_secs = start.elapsed().as_secs(),
                    "waiting for task group"
                );
                tokio::time::sleep(interval).await;
            }
        })
        .await;

        match waited {
            Ok(report) => Ok(report),
            Err(_) => {
                let err = GenFlowError::Timeout(budget);
                for member in group.members.iter_mut() {
                    member.fail(&err);
                }
                self.record_terminal(group);
                tracing::warn!(group_id = %group.id, "task group timed out after {budget:?}");
                Err(err)
            }
        }
    }

    /// Submits a job and waits for its group to finish.
    pub async fn submit_and_wait(&self, job: &GenerationJob) -> Result<TaskGroup> {
        let mut group = self.submit_group(job).await?;
        self.wait(&mut group).await?;
        Ok(group)
    }

    /// Polls one task every poll interval until it is terminal.
    ///
    /// Poll errors are returned as-is; exceeding the budget returns
    /// [`GenFlowError::Timeout`].
    pub async fn wait_task(&self, handle: &TaskHandle) -> Result<TaskSnapshot> {
        let budget = self.config.wait_timeout;
        let start = Instant::now();

        tokio::time::timeout(budget, async {
            loop {
                let snapshot = self.poll(handle).await?;
                if snapshot.status.is_terminal() {
                    return Ok::<_, GenFlowError>(snapshot);
                }
                tracing::debug!(
                    task_id = %handle.task_id,
                    status = %snapshot.status,
                    elapsed_secs = start.elapsed().as_secs(),
                    "waiting for task"
                );
                tokio::time::sleep(self.config.poll_interval).await;
            }
        })
        .await
        .map_err(|_| GenFlowError::Timeout(budget))?
    }

    async fn refresh_task(&self, task: &mut GenerationTask, context: &PersistContext) {
        let Some(handle) = task.handle.clone() else {
            return;
        };
        match self.poll(&handle).await {
            Ok(snapshot) => {
                let previous = task.status;
                task.apply(snapshot);
                if task.status != previous {
                    tracing::debug!(
                        task_id = %handle.task_id,
                        from = %previous,
                        to = %task.status,
                        "task status changed"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(task_id = %handle.task_id, "poll failed, marking task failed: {e}");
                task.fail(&e);
            }
        }
        task.last_polled_at = Some(Utc::now());
        self.persist_task(task, context).await;
    }

    /// Hands artifacts of a newly SUCCEEDED task to persistence, once.
    async fn persist_task(&self, task: &mut GenerationTask, context: &PersistContext) {
        if task.status != TaskStatus::Succeeded || task.persisted {
            return;
        }
        let mut durable = Vec::with_capacity(task.artifact_urls.len());
        for url in &task.artifact_urls {
            durable.push(self.persistence.persist(url, context).await);
        }
        task.artifact_urls = durable;
        task.persisted = true;
    }

    fn record_terminal(&self, group: &mut TaskGroup) -> GroupReport {
        let report = GroupReport::from_members(&group.members);
        if report.status.is_terminal() && group.terminal.is_none() {
            tracing::info!(
                group_id = %group.id,
                status = %report.status,
                succeeded = report.succeeded,
                failed = report.failed,
                "task group finished"
            );
            group.terminal = Some(report.clone());
        }
        report
    }
}

fn persist_context(group: &TaskGroup) -> PersistContext {
    PersistContext {
        category: group.category,
        project: group.project.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{catalog, Category, Params, ProviderKind, SubmissionStyle};
    use crate::request::GenerationInput;
    use crate::storage::ObjectStore;
    use crate::task::backend::TaskBackend;
    use crate::task::types::{GroupStatus, TaskError};
    use crate::transfer::{Downloader, Fetched};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone)]
    enum Step {
        Report(TaskSnapshot),
        Garbled,
    }

    /// Scripted async-poll backend. Task ids are `task-{seed}`.
    #[derive(Default)]
    struct ScriptedBackend {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        rejected_seeds: Vec<i64>,
        polls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn script(self, task_id: &str, steps: Vec<Step>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(task_id.to_string(), steps.into());
            self
        }
    }

    #[async_trait]
    impl TaskBackend for ScriptedBackend {
        fn provider(&self) -> ProviderKind {
            ProviderKind::DashScope
        }

        fn style(&self) -> SubmissionStyle {
            SubmissionStyle::AsyncHttpPoll
        }

        async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle> {
            let seed = request.seed.unwrap_or_default();
            if self.rejected_seeds.contains(&seed) {
                return Err(GenFlowError::provider(
                    Some(400),
                    "InvalidParameter",
                    format!("seed {seed} rejected"),
                ));
            }
            Ok(TaskHandle::remote(
                format!("task-{seed}"),
                &request.model,
                self.provider(),
                self.style(),
            ))
        }

        async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut scripts = self.scripts.lock().unwrap();
            let steps = scripts
                .get_mut(&handle.task_id)
                .ok_or_else(|| GenFlowError::Protocol(format!("no script for {}", handle.task_id)))?;
            let step = if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            };
            match step {
                Some(Step::Report(snapshot)) => Ok(snapshot),
                Some(Step::Garbled) | None => Err(GenFlowError::Protocol("garbled status".into())),
            }
        }
    }

    /// Blocking backend that finishes every request on submission.
    struct InstantBackend {
        submitted: AtomicUsize,
    }

    #[async_trait]
    impl TaskBackend for InstantBackend {
        fn provider(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn style(&self) -> SubmissionStyle {
            SubmissionStyle::Blocking
        }

        async fn submit(&self, request: &ProviderRequest) -> Result<TaskHandle> {
            let n = self.submitted.fetch_add(1, Ordering::SeqCst);
            Ok(
                TaskHandle::remote(format!("img-{n}"), &request.model, self.provider(), self.style())
                    .finished(TaskSnapshot::succeeded(vec![format!("https://openai/img-{n}.png")])),
            )
        }

        async fn poll(&self, _handle: &TaskHandle) -> Result<TaskSnapshot> {
            panic!("blocking tasks are never polled");
        }
    }

    struct CountingStore {
        puts: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn put(&self, key: &str, _bytes: Vec<u8>, _ct: Option<&str>) -> Result<String> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://cdn.example.com/{key}"))
        }
    }

    struct StaticDownloader;

    #[async_trait]
    impl Downloader for StaticDownloader {
        async fn fetch(&self, _url: &str) -> Result<Fetched> {
            Ok(Fetched {
                bytes: vec![0; 8],
                content_type: Some("video/mp4".into()),
            })
        }
    }

    fn running() -> Step {
        Step::Report(TaskSnapshot::running())
    }

    fn pending() -> Step {
        Step::Report(TaskSnapshot::pending())
    }

    fn done(url: &str) -> Step {
        Step::Report(TaskSnapshot::succeeded(vec![url.to_string()]))
    }

    fn failed(code: &str, message: &str) -> Step {
        Step::Report(TaskSnapshot::failed(Some(code.to_string()), message))
    }

    fn config() -> EngineConfig {
        EngineConfig::builder()
            .poll_interval(Duration::from_secs(5))
            .wait_timeout(Duration::from_secs(60))
            .max_group_size(4)
            .build()
            .unwrap()
    }

    fn engine_with(backend: Arc<dyn TaskBackend>, persistence: Persistence) -> TaskEngine {
        TaskEngine::new(
            Arc::new(catalog::builtin().unwrap()),
            BackendSet::new().with(backend),
            persistence,
            config(),
        )
    }

    fn video_job(count: usize) -> GenerationJob {
        GenerationJob::new(
            Category::TextToVideo,
            "wan2.2-t2v-plus",
            GenerationInput::new("waves at night"),
        )
        .with_params(json!({"seed": 100}).as_object().cloned().unwrap())
        .with_count(count)
        .with_project("demo")
    }

    #[tokio::test]
    async fn test_submit_group_preserves_member_order() {
        let engine = engine_with(Arc::new(ScriptedBackend::default()), Persistence::disabled());
        let group = engine.submit_group(&video_job(3)).await.unwrap();

        let ids: Vec<_> = group.members.iter().map(|m| m.task_id().unwrap()).collect();
        assert_eq!(ids, vec!["task-100", "task-101", "task-102"]);
        assert!(group.members.iter().all(|m| m.status == TaskStatus::Pending));
        assert_eq!(group.status(), GroupStatus::Processing);
        assert!(!group.is_terminal());
    }

    #[tokio::test]
    async fn test_refresh_partial_progress() {
        let backend = ScriptedBackend::default()
            .script("task-100", vec![done("https://oss/a.mp4")])
            .script("task-101", vec![running()])
            .script("task-102", vec![pending()]);
        let engine = engine_with(Arc::new(backend), Persistence::disabled());
        let mut group = engine.submit_group(&video_job(3)).await.unwrap();

        let report = engine.refresh(&mut group).await;
        assert_eq!(report.status, GroupStatus::Processing);
        assert_eq!(report.artifact_urls(), vec!["https://oss/a.mp4"]);
        assert_eq!(report.artifacts[1], None);
        assert!(group.members.iter().all(|m| m.last_polled_at.is_some()));
    }

    #[tokio::test]
    async fn test_refresh_finished_with_failure() {
        let backend = ScriptedBackend::default()
            .script("task-100", vec![done("https://oss/a.mp4")])
            .script("task-101", vec![done("https://oss/b.mp4")])
            .script(
                "task-102",
                vec![failed("DataInspectionFailed", "Output data may contain inappropriate content.")],
            );
        let engine = engine_with(Arc::new(backend), Persistence::disabled());
        let mut group = engine.submit_group(&video_job(3)).await.unwrap();

        let report = engine.refresh(&mut group).await;
        assert_eq!(report.status, GroupStatus::Failed);
        assert_eq!(report.artifact_urls().len(), 2);
        let error = report.error.unwrap();
        let rejected = GenFlowError::provider(
            Some(400),
            "DataInspectionFailed",
            "Output data may contain inappropriate content.",
        );
        // same explanation whether the rejection came at submit or poll time
        assert_eq!(error, TaskError::from(&rejected).to_string());
        assert!(error.starts_with("[DataInspectionFailed] The request or the generated result"));
        assert!(group.is_terminal());
    }

    #[tokio::test]
    async fn test_terminal_group_is_not_polled_again() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .script("task-100", vec![done("https://oss/a.mp4")])
                .script("task-101", vec![done("https://oss/b.mp4")]),
        );
        let engine = engine_with(backend.clone(), Persistence::disabled());
        let mut group = engine.submit_group(&video_job(2)).await.unwrap();

        let first = engine.refresh(&mut group).await;
        assert_eq!(first.status, GroupStatus::Succeeded);
        let polls = backend.polls.load(Ordering::SeqCst);
        assert_eq!(polls, 2);

        let second = engine.refresh(&mut group).await;
        assert_eq!(second, first);
        assert_eq!(backend.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test]
    async fn test_finished_members_are_not_polled() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .script("task-100", vec![done("https://oss/a.mp4")])
                .script("task-101", vec![running(), running(), done("https://oss/b.mp4")]),
        );
        let engine = engine_with(backend.clone(), Persistence::disabled());
        let mut group = engine.submit_group(&video_job(2)).await.unwrap();

        engine.refresh(&mut group).await;
        engine.refresh(&mut group).await;
        let report = engine.refresh(&mut group).await;
        assert_eq!(report.status, GroupStatus::Succeeded);
        // member 0 polled once, member 1 three times
        assert_eq!(backend.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_error_fails_only_that_member() {
        let backend = ScriptedBackend::default()
            .script("task-100", vec![Step::Garbled])
            .script("task-101", vec![done("https://oss/b.mp4")]);
        let engine = engine_with(Arc::new(backend), Persistence::disabled());
        let mut group = engine.submit_group(&video_job(2)).await.unwrap();

        let report = engine.refresh(&mut group).await;
        assert_eq!(report.status, GroupStatus::Failed);
        assert_eq!(group.members[0].status, TaskStatus::Failed);
        assert_eq!(group.members[1].status, TaskStatus::Succeeded);
        assert_eq!(report.artifacts, vec![None, Some("https://oss/b.mp4".into())]);
    }

    #[tokio::test]
    async fn test_rejected_submission_becomes_failed_member() {
        let backend = ScriptedBackend {
            rejected_seeds: vec![101],
            ..Default::default()
        }
        .script("task-100", vec![done("https://oss/a.mp4")]);
        let engine = engine_with(Arc::new(backend), Persistence::disabled());

        let mut group = engine.submit_group(&video_job(2)).await.unwrap();
        assert_eq!(group.members[1].status, TaskStatus::Failed);
        assert!(group.members[1].task_id().is_none());

        let report = engine.refresh(&mut group).await;
        assert_eq!(report.status, GroupStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("[InvalidParameter] seed 101 rejected"));
    }

    #[tokio::test]
    async fn test_all_submissions_rejected_returns_error() {
        let backend = ScriptedBackend {
            rejected_seeds: vec![100, 101],
            ..Default::default()
        };
        let engine = engine_with(Arc::new(backend), Persistence::disabled());
        let err = engine.submit_group(&video_job(2)).await.unwrap_err();
        assert_eq!(err.code(), Some("InvalidParameter"));
    }

    #[tokio::test]
    async fn test_validation_error_never_reaches_backend() {
        let engine = engine_with(Arc::new(ScriptedBackend::default()), Persistence::disabled());
        let job = video_job(1).with_params(json!({"size": "7*7"}).as_object().cloned().unwrap());
        let err = engine.submit_group(&job).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_group_size_limit() {
        let engine = engine_with(Arc::new(ScriptedBackend::default()), Persistence::disabled());
        let err = engine.submit_group(&video_job(5)).await.unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum of 4"));
    }

    #[tokio::test]
    async fn test_missing_backend() {
        let engine = engine_with(Arc::new(ScriptedBackend::default()), Persistence::disabled());
        let job = GenerationJob::new(
            Category::ImageToVideo,
            "doubao-seedance-1-0-pro-250528",
            GenerationInput::new("a boat").with_image("https://cdn/boat.jpg"),
        );
        let err = engine.submit_group(&job).await.unwrap_err();
        assert!(matches!(err, GenFlowError::ProviderNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_blocking_group_is_terminal_on_submit() {
        let engine = engine_with(
            Arc::new(InstantBackend {
                submitted: AtomicUsize::new(0),
            }),
            Persistence::disabled(),
        );
        let job = GenerationJob::new(Category::TextToImage, "gpt-image-1", GenerationInput::new("a fox"))
            .with_count(2);
        let mut group = engine.submit_group(&job).await.unwrap();

        assert!(group.is_terminal());
        let report = engine.refresh(&mut group).await;
        assert_eq!(report.status, GroupStatus::Succeeded);
        assert_eq!(report.artifact_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_success_is_persisted_once() {
        let store = Arc::new(CountingStore {
            puts: AtomicUsize::new(0),
        });
        let backend = ScriptedBackend::default()
            .script("task-100", vec![done("https://oss/a.mp4")])
            .script("task-101", vec![running(), done("https://oss/b.mp4")]);
        let engine = engine_with(
            Arc::new(backend),
            Persistence::new(Some(store.clone()), Arc::new(StaticDownloader)),
        );
        let mut group = engine.submit_group(&video_job(2)).await.unwrap();

        engine.refresh(&mut group).await;
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        let report = engine.refresh(&mut group).await;
        assert_eq!(store.puts.load(Ordering::SeqCst), 2);

        for url in report.artifact_urls() {
            assert!(url.starts_with("https://cdn.example.com/text_to_video/demo/"), "{url}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_finished() {
        let backend = ScriptedBackend::default()
            .script("task-100", vec![pending(), running(), done("https://oss/a.mp4")]);
        let engine = engine_with(Arc::new(backend), Persistence::disabled());

        let start = Instant::now();
        let group = engine.submit_and_wait(&video_job(1)).await.unwrap();
        assert_eq!(group.status(), GroupStatus::Succeeded);
        // two sleeps between three polls
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_marks_group_failed() {
        let backend = ScriptedBackend::default()
            .script("task-100", vec![running()])
            .script("task-101", vec![done("https://oss/b.mp4")]);
        let engine = engine_with(Arc::new(backend), Persistence::disabled());
        let mut group = engine.submit_group(&video_job(2)).await.unwrap();

        let start = Instant::now();
        let err = engine.wait(&mut group).await.unwrap_err();
        assert!(matches!(err, GenFlowError::Timeout(d) if d == Duration::from_secs(60)));
        assert!(start.elapsed() <= Duration::from_secs(61));

        assert!(group.is_terminal());
        assert_eq!(group.members[0].status, TaskStatus::Failed);
        assert_eq!(
            group.members[0].error.as_ref().unwrap().code.as_deref(),
            Some("Timeout")
        );
        // the finished member keeps its result
        assert_eq!(group.members[1].status, TaskStatus::Succeeded);
        assert_eq!(group.status(), GroupStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_task() {
        let backend = ScriptedBackend::default()
            .script("task-7", vec![running(), done("https://oss/x.mp4")])
            .script("task-8", vec![running()]);
        let engine = engine_with(Arc::new(backend), Persistence::disabled());

        let handle = |id: &str| {
            TaskHandle::remote(id, "wan2.2-t2v-plus", ProviderKind::DashScope, SubmissionStyle::AsyncHttpPoll)
        };
        let snapshot = engine.wait_task(&handle("task-7")).await.unwrap();
        assert_eq!(snapshot.artifact_urls, vec!["https://oss/x.mp4"]);

        let err = engine.wait_task(&handle("task-8")).await.unwrap_err();
        assert!(matches!(err, GenFlowError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_single_member_without_seed() {
        let engine = engine_with(
            Arc::new(InstantBackend {
                submitted: AtomicUsize::new(0),
            }),
            Persistence::disabled(),
        );
        let job = GenerationJob::new(Category::TextToImage, "gpt-image-1", GenerationInput::new("a fox"))
            .with_params(Params::new());
        let group = engine.submit_group(&job).await.unwrap();
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].seed, None);
    }
}
