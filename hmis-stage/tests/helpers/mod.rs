//! Test Helper Utilities
//!
//! Scripted in-memory staging client and orchestrator fixtures

#![allow(dead_code)]

use hmis_common::config::DelayConfig;
use hmis_common::StagerConfig;
use hmis_stage::services::{OutcomeLog, StageOrchestrator, StageSettings};
use hmis_stage::{
    Job, JobStatus, NudgeError, RecordQuery, ResultSet, StagingClient, StagingSession, TimeRange,
    TransportError,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

type CountFn = Box<dyn Fn(&TimeRange) -> u64 + Send + Sync>;

/// Staging client driven by queued responses
///
/// Scripted responses are consumed first; once a queue is empty the client
/// falls back to its defaults (count 100, submit status `Staging`, nudges
/// leave the status unchanged).
pub struct ScriptedClient {
    search_script: Mutex<VecDeque<Result<u64, TransportError>>>,
    submit_script: Mutex<VecDeque<Result<JobStatus, TransportError>>>,
    nudge_script: Mutex<VecDeque<Result<JobStatus, TransportError>>>,
    default_count: CountFn,
    default_submit: Mutex<JobStatus>,
    searches: Mutex<Vec<TimeRange>>,
    submits: Mutex<Vec<TimeRange>>,
    nudges: Mutex<Vec<String>>,
    download_dirs: Mutex<Vec<PathBuf>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            search_script: Mutex::new(VecDeque::new()),
            submit_script: Mutex::new(VecDeque::new()),
            nudge_script: Mutex::new(VecDeque::new()),
            default_count: Box::new(|_| 100),
            default_submit: Mutex::new(JobStatus::Staging),
            searches: Mutex::new(Vec::new()),
            submits: Mutex::new(Vec::new()),
            nudges: Mutex::new(Vec::new()),
            download_dirs: Mutex::new(Vec::new()),
        }
    }

    /// Record counts computed from the range when no search is scripted
    pub fn with_counts(mut self, counts: impl Fn(&TimeRange) -> u64 + Send + Sync + 'static) -> Self {
        self.default_count = Box::new(counts);
        self
    }

    pub fn with_default_submit(self, status: JobStatus) -> Self {
        *self.default_submit.lock().unwrap() = status;
        self
    }

    pub fn push_search(&self, response: Result<u64, TransportError>) {
        self.search_script.lock().unwrap().push_back(response);
    }

    pub fn push_submit(&self, response: Result<JobStatus, TransportError>) {
        self.submit_script.lock().unwrap().push_back(response);
    }

    pub fn push_nudge(&self, response: Result<JobStatus, TransportError>) {
        self.nudge_script.lock().unwrap().push_back(response);
    }

    pub fn searches(&self) -> Vec<TimeRange> {
        self.searches.lock().unwrap().clone()
    }

    pub fn submits(&self) -> Vec<TimeRange> {
        self.submits.lock().unwrap().clone()
    }

    pub fn nudge_count(&self) -> usize {
        self.nudges.lock().unwrap().len()
    }

    pub fn download_dirs(&self) -> Vec<PathBuf> {
        self.download_dirs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StagingClient for ScriptedClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &RecordQuery) -> Result<ResultSet, TransportError> {
        self.searches.lock().unwrap().push(query.range);

        let scripted = self.search_script.lock().unwrap().pop_front();
        let count = match scripted {
            Some(response) => response?,
            None => (self.default_count)(&query.range),
        };

        Ok(ResultSet {
            query: query.clone(),
            count,
        })
    }

    async fn submit(&self, results: &ResultSet) -> Result<Job, TransportError> {
        let number = {
            let mut submits = self.submits.lock().unwrap();
            submits.push(results.query.range);
            submits.len()
        };

        let scripted = self.submit_script.lock().unwrap().pop_front();
        let status = match scripted {
            Some(response) => response?,
            None => *self.default_submit.lock().unwrap(),
        };

        let range = results.query.range;
        Ok(Job::new(
            format!(
                "JSOC_{}{:02}{:02}_{}",
                range.year(),
                range.month(),
                range.start_day(),
                number
            ),
            status,
        ))
    }

    async fn nudge(&self, job: &Job, download_dir: &Path) -> Result<Job, NudgeError> {
        self.nudges.lock().unwrap().push(job.id.clone());
        self.download_dirs
            .lock()
            .unwrap()
            .push(download_dir.to_path_buf());

        let scripted = self.nudge_script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(status)) => Ok(job.with_status(status)),
            Some(Err(e)) => Err(NudgeError::Transport(e)),
            None => Ok(job.clone()),
        }
    }
}

/// Config with zero delays and logs in `log_dir`
pub fn test_config(log_dir: &Path) -> StagerConfig {
    StagerConfig {
        notify_address: Some("observer@example.org".to_string()),
        log_dir: log_dir.to_path_buf(),
        download_dir: log_dir.join("downloads"),
        delays: DelayConfig::none(),
        ..StagerConfig::default()
    }
}

pub fn test_session(config: &StagerConfig, year: i32, month: u32) -> StagingSession {
    StagingSession::new(year, month, None, config, "observer@example.org").unwrap()
}

/// Orchestrator, its client, and the temp dir holding its logs
pub struct Fixture {
    pub temp_dir: TempDir,
    pub config: StagerConfig,
    pub client: Arc<ScriptedClient>,
    pub cancel_token: CancellationToken,
    pub orchestrator: StageOrchestrator,
}

impl Fixture {
    pub fn new(client: ScriptedClient) -> Self {
        Self::with_config(client, |_| {})
    }

    pub fn with_config(client: ScriptedClient, adjust: impl FnOnce(&mut StagerConfig)) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        adjust(&mut config);

        let client = Arc::new(client);
        let cancel_token = CancellationToken::new();
        let orchestrator = StageOrchestrator::new(
            client.clone(),
            Arc::new(OutcomeLog::from_config(&config)),
            StageSettings::from(&config),
            cancel_token.clone(),
        );

        Self {
            temp_dir,
            config,
            client,
            cancel_token,
            orchestrator,
        }
    }

    pub fn session(&self, year: i32, month: u32) -> StagingSession {
        test_session(&self.config, year, month)
    }

    /// Success log lines (empty if the file was never created)
    pub fn success_lines(&self) -> Vec<String> {
        read_lines(&self.config.success_log_path())
    }

    /// Failure log lines (empty if the file was never created)
    pub fn failure_lines(&self) -> Vec<String> {
        read_lines(&self.config.failure_log_path())
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn days(range: &TimeRange) -> (u32, u32) {
    (range.start_day(), range.end_day())
}
