//! Job registry for background solves.
//!
//! Every job runs the local search on its own thread. The registry maps a
//! caller-supplied job id to the status, latest best plan and cancellation
//! flag of its current run; it is the only state shared with the workers.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{self, ScoreAnalysis};
use crate::config::SolverConfig;
use crate::domain::{RoutePlan, SolverStatus};
use crate::error::{Result, SolverError};
use crate::haversine::HaversineMatrix;
use crate::solver::{LocalSearch, SolveOutcome};
use crate::state::{RouteState, resolve_routes};
use crate::traits::DistanceMatrixProvider;

/// Registry entry of one job.
struct SolveJob {
    /// Identifies the run that owns this entry, so a stale worker of a
    /// removed or resubmitted job cannot overwrite it.
    run: u64,
    status: SolverStatus,
    best: RoutePlan,
    terminate_flag: Arc<AtomicBool>,
    error: Option<String>,
    handle: Option<JoinHandle<()>>,
}

type Registry = Arc<Mutex<HashMap<String, SolveJob>>>;

/// Starts, tracks and stops solver runs.
///
/// ```no_run
/// use technician_routing::config::SolverConfig;
/// use technician_routing::domain::{Location, RoutePlan, Technician, Visit};
/// use technician_routing::manager::SolverManager;
///
/// let manager = SolverManager::new(SolverConfig::default());
/// let plan = RoutePlan::new(
///     "demo",
///     Location::new(0.0, 0.0),
///     Location::new(1.0, 1.0),
///     vec![Technician::new("t1", 10, Location::new(0.0, 0.0))],
///     vec![Visit::new("v1", "Ann", Location::new(0.5, 0.5), 2)],
/// );
///
/// manager.solve("job-1", plan, |best| println!("{:?}", best.score)).unwrap();
/// manager.terminate("job-1");
/// manager.await_termination("job-1");
/// ```
pub struct SolverManager {
    config: SolverConfig,
    provider: Arc<dyn DistanceMatrixProvider>,
    jobs: Registry,
    next_run: AtomicU64,
}

impl SolverManager {
    /// Uses great-circle travel times.
    ///
    /// `config` is checked by [`SolverConfig::validate`] on every
    /// [`solve`](Self::solve), so a builder-made config that fails validation
    /// schedules nothing.
    pub fn new(config: SolverConfig) -> Self {
        Self::with_provider(config, Arc::new(HaversineMatrix::default()))
    }

    pub fn with_provider(config: SolverConfig, provider: Arc<dyn DistanceMatrixProvider>) -> Self {
        Self {
            config,
            provider,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_run: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Starts solving `plan` under `job_id` and returns immediately.
    ///
    /// The configuration and the plan are validated first; if either is
    /// invalid nothing is scheduled. `listener` runs on the worker thread for
    /// every new best plan.
    pub fn solve<F>(&self, job_id: impl Into<String>, plan: RoutePlan, listener: F) -> Result<()>
    where
        F: FnMut(RoutePlan) + Send + 'static,
    {
        let job_id = job_id.into();
        self.config
            .validate()
            .map_err(|error| SolverError::InvalidConfig(error.to_string()))?;
        resolve_routes(&plan)?;

        let mut jobs = self.jobs.lock();
        if jobs
            .get(&job_id)
            .is_some_and(|job| job.status == SolverStatus::Solving)
        {
            return Err(SolverError::AlreadySolving(job_id));
        }

        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        let terminate_flag = Arc::new(AtomicBool::new(false));
        let mut best = plan.clone();
        best.solver_status = SolverStatus::Solving;

        let worker = Worker {
            job_id: job_id.clone(),
            run,
            plan,
            search: LocalSearch::new(self.config.clone()),
            provider: Arc::clone(&self.provider),
            jobs: Arc::clone(&self.jobs),
            terminate_flag: Arc::clone(&terminate_flag),
        };
        let spawned = thread::Builder::new()
            .name(format!("solver-{job_id}"))
            .spawn(move || worker.run(listener));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(error) => {
                warn!(job_id = %job_id, %error, "failed to start solver thread");
                return Err(SolverError::Worker(error.to_string()));
            }
        };

        info!(job_id = %job_id, run, "solving started");
        jobs.insert(
            job_id,
            SolveJob {
                run,
                status: SolverStatus::Solving,
                best,
                terminate_flag,
                error: None,
                handle: Some(handle),
            },
        );
        Ok(())
    }

    /// Starts solving under a generated job id and returns that id.
    pub fn submit(&self, plan: RoutePlan) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        self.solve(job_id.clone(), plan, |_| {})?;
        Ok(job_id)
    }

    /// Unknown ids are `NotSolving`.
    pub fn get_status(&self, job_id: &str) -> SolverStatus {
        self.jobs
            .lock()
            .get(job_id)
            .map_or(SolverStatus::NotSolving, |job| job.status)
    }

    /// Latest best plan of a job with the job's status.
    pub fn get_plan(&self, job_id: &str) -> Option<(RoutePlan, SolverStatus)> {
        let jobs = self.jobs.lock();
        let job = jobs.get(job_id)?;
        let mut plan = job.best.clone();
        plan.solver_status = job.status;
        Some((plan, job.status))
    }

    /// Failure message of a run that was aborted by an internal error.
    pub fn get_error(&self, job_id: &str) -> Option<String> {
        self.jobs.lock().get(job_id).and_then(|job| job.error.clone())
    }

    /// Requests cooperative cancellation and returns the current status.
    ///
    /// Does not wait for the worker. Calling it again, after the run ended,
    /// or for an unknown id changes nothing.
    pub fn terminate(&self, job_id: &str) -> SolverStatus {
        let jobs = self.jobs.lock();
        let Some(job) = jobs.get(job_id) else {
            return SolverStatus::NotSolving;
        };
        if job.status == SolverStatus::Solving && !job.terminate_flag.swap(true, Ordering::Relaxed) {
            info!(job_id, "termination requested");
        }
        job.status
    }

    /// Blocks until the current run of `job_id` has exited.
    pub fn await_termination(&self, job_id: &str) -> SolverStatus {
        let handle = self
            .jobs
            .lock()
            .get_mut(job_id)
            .and_then(|job| job.handle.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(job_id, "solver thread panicked outside the search");
            }
        }
        self.get_status(job_id)
    }

    /// Drops a job from the registry, cancelling it if it still runs.
    pub fn remove_job(&self, job_id: &str) -> Option<RoutePlan> {
        let job = self.jobs.lock().remove(job_id)?;
        job.terminate_flag.store(true, Ordering::Relaxed);
        debug!(job_id, "job removed");
        Some(job.best)
    }

    pub fn list_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Score breakdown of any plan. Synchronous; the plan is not modified.
    pub fn analyze(&self, plan: &RoutePlan) -> Result<ScoreAnalysis> {
        let analysis =
            analysis::analyze(plan, self.provider.as_ref(), &self.config.constraint_set())?;
        Ok(analysis)
    }
}

/// Everything a worker thread owns.
struct Worker {
    job_id: String,
    run: u64,
    plan: RoutePlan,
    search: LocalSearch,
    provider: Arc<dyn DistanceMatrixProvider>,
    jobs: Registry,
    terminate_flag: Arc<AtomicBool>,
}

impl Worker {
    fn run<F>(self, mut listener: F)
    where
        F: FnMut(RoutePlan),
    {
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<SolveOutcome> {
            let state = RouteState::from_plan(&self.plan, self.provider.as_ref())?;
            self.search.solve(state, &self.terminate_flag, |best| {
                self.update(|job| job.best = best.clone());
                listener(best.clone());
            })
        }));

        match result {
            Ok(Ok(outcome)) => {
                info!(
                    job_id = %self.job_id,
                    score = %outcome.best_score,
                    reason = ?outcome.reason,
                    iterations = outcome.iterations,
                    "solving ended"
                );
                self.update(|job| {
                    job.best = outcome.best;
                    job.status = SolverStatus::Terminated;
                });
            }
            Ok(Err(error)) => self.abort(error.to_string()),
            Err(payload) => self.abort(panic_message(payload.as_ref())),
        }
    }

    fn abort(&self, message: String) {
        warn!(job_id = %self.job_id, error = %message, "solving aborted");
        self.update(|job| {
            job.best.solver_status = SolverStatus::Terminated;
            job.status = SolverStatus::Terminated;
            job.error = Some(message);
        });
    }

    /// Applies `change` to this run's entry; does nothing if the entry now
    /// belongs to another run or was removed.
    fn update(&self, change: impl FnOnce(&mut SolveJob)) {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(&self.job_id).filter(|job| job.run == self.run) {
            change(job);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "solver thread panicked".to_string())
}
