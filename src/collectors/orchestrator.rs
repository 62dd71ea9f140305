//! Collection orchestrator.
//!
//! Runs a set of independent, named jobs either one after another or on a
//! bounded pool of worker threads. A job that returns an error or panics is
//! recorded as failed and never stops the others from running.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

/// A routine that gathers one category of diagnostic data into the bundle.
///
/// Implementors hold every input they need, so they can be moved onto a
/// worker thread and run without touching shared state.
pub trait Collector: Send + 'static {
    /// Short name used in logs and the run summary
    fn name(&self) -> &'static str;

    /// Gather the data. An `Err` marks the collector as failed.
    fn collect(&self) -> Result<()>;
}

type Action = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A named unit of work scheduled by [`run`].
pub struct Job {
    name: String,
    action: Action,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    /// Wrap a collector so that running the job calls [`Collector::collect`]
    pub fn from_collector<C: Collector>(collector: C) -> Self {
        let name = collector.name();
        Self::new(name, move || collector.collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the action once, converting errors and panics into a failed outcome
    fn run(self) -> JobOutcome {
        let Job { name, action } = self;
        let start = Instant::now();
        info!("Running collector: {}", name);

        let status = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => JobStatus::Succeeded,
            Ok(Err(e)) => JobStatus::Failed(format!("{:#}", e)),
            Err(payload) => JobStatus::Failed(format!("panicked: {}", panic_message(payload.as_ref()))),
        };

        match &status {
            JobStatus::Succeeded => debug!("Collector {} finished in {:?}", name, start.elapsed()),
            JobStatus::Failed(reason) => warn!("Collector {} failed: {}", name, reason),
        }

        JobOutcome { name, status }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// How the jobs of a run are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Submission order, on the calling thread
    Serial,
    /// At most `max_workers` jobs in flight at once
    Parallel { max_workers: usize },
}

impl ExecutionMode {
    pub fn from_flags(parallel: bool, max_workers: usize) -> Self {
        if parallel {
            ExecutionMode::Parallel { max_workers }
        } else {
            ExecutionMode::Serial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub name: String,
    pub status: JobStatus,
}

/// Outcomes of one run, in the order the jobs finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn from_outcomes(outcomes: Vec<JobOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    /// Names of the jobs that succeeded, in completion order
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == JobStatus::Succeeded)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Names of the jobs that failed, in completion order
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed(_)))
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == JobStatus::Succeeded)
    }
}

/// Run every job exactly once and report how each one ended.
///
/// Serial mode is used whenever there is at most one job. In parallel mode
/// the pool holds `min(max_workers, jobs.len())` threads (a width of 0 is
/// treated as 1), and outcomes are appended as jobs complete.
///
/// # Arguments
///
/// * `jobs` - Jobs to run; names should be unique within the run
/// * `mode` - Scheduling policy
///
/// # Returns
///
/// A [`RunReport`] in which every submitted job appears exactly once
pub fn run(jobs: Vec<Job>, mode: ExecutionMode) -> RunReport {
    let start = Instant::now();
    let total = jobs.len();

    let outcomes = match mode {
        ExecutionMode::Parallel { max_workers } if total > 1 => run_parallel(jobs, max_workers),
        _ => jobs.into_iter().map(Job::run).collect(),
    };

    let report = RunReport::from_outcomes(outcomes);
    info!(
        "Ran {} collectors in {:?}: {} succeeded, {} failed",
        total,
        start.elapsed(),
        report.succeeded().len(),
        report.failed().len()
    );
    report
}

fn run_parallel(jobs: Vec<Job>, max_workers: usize) -> Vec<JobOutcome> {
    let total = jobs.len();
    let thread_count = max_workers.max(1).min(total);

    let (job_sender, job_receiver) = unbounded::<Job>();
    let (outcome_sender, outcome_receiver) = unbounded::<JobOutcome>();

    for job in jobs {
        // The receiver is alive until this function returns
        let _ = job_sender.send(job);
    }
    drop(job_sender);

    let mut workers = Vec::with_capacity(thread_count);
    for i in 0..thread_count {
        let worker_jobs = job_receiver.clone();
        let worker_outcomes = outcome_sender.clone();

        match thread::Builder::new()
            .name(format!("collector-{}", i))
            .spawn(move || collection_worker(worker_jobs, worker_outcomes))
        {
            Ok(handle) => workers.push(handle),
            Err(e) => warn!("Failed to spawn collector worker {}: {}", i, e),
        }
    }

    if workers.is_empty() {
        warn!("No collector workers available, running jobs serially");
        collection_worker(job_receiver, outcome_sender);
    } else {
        debug!("Started {} collector workers for {} jobs", workers.len(), total);
        drop(job_receiver);
        drop(outcome_sender);
    }

    let outcomes: Vec<JobOutcome> = outcome_receiver.iter().collect();

    for worker in workers {
        if worker.join().is_err() {
            warn!("A collector worker exited abnormally");
        }
    }

    outcomes
}

/// Pull jobs until the queue is drained, reporting each outcome as it completes
fn collection_worker(jobs: Receiver<Job>, outcomes: Sender<JobOutcome>) {
    for job in jobs.iter() {
        if outcomes.send(job.run()).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn names(list: Vec<&str>) -> BTreeSet<String> {
        list.into_iter().map(String::from).collect()
    }

    fn mixed_jobs(calls: &Arc<AtomicUsize>) -> Vec<Job> {
        (0..8)
            .map(|i| {
                let calls = Arc::clone(calls);
                Job::new(format!("job-{}", i), move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if i % 3 == 0 {
                        bail!("job {} broke", i);
                    }
                    Ok(())
                })
            })
            .collect()
    }

    fn assert_partition(report: &RunReport, total: usize) {
        let succeeded = names(report.succeeded());
        let failed = names(report.failed());
        let all: BTreeSet<String> = (0..total).map(|i| format!("job-{}", i)).collect();

        assert!(succeeded.is_disjoint(&failed));
        assert_eq!(succeeded.union(&failed).cloned().collect::<BTreeSet<_>>(), all);
        assert_eq!(report.outcomes().len(), total);
    }

    #[test]
    fn test_serial_partition_and_isolation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = run(mixed_jobs(&calls), ExecutionMode::Serial);

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_partition(&report, 8);
        assert_eq!(report.failed(), vec!["job-0", "job-3", "job-6"]);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_parallel_partition_and_isolation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = run(mixed_jobs(&calls), ExecutionMode::Parallel { max_workers: 3 });

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_partition(&report, 8);
        assert_eq!(names(report.failed()), names(vec!["job-0", "job-3", "job-6"]));
    }

    #[test]
    fn test_serial_runs_in_submission_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let jobs = (0..5)
            .map(|i| {
                let order = Arc::clone(&order);
                Job::new(format!("job-{}", i), move || {
                    order.lock().unwrap().push(i);
                    Ok(())
                })
            })
            .collect();

        let report = run(jobs, ExecutionMode::Serial);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(report.succeeded(), vec!["job-0", "job-1", "job-2", "job-3", "job-4"]);
    }

    #[test]
    fn test_panicking_job_is_isolated() {
        for mode in [ExecutionMode::Serial, ExecutionMode::Parallel { max_workers: 2 }] {
            let calls = Arc::new(AtomicUsize::new(0));
            let after = Arc::clone(&calls);
            let jobs = vec![
                Job::new("boom", || panic!("collector exploded")),
                Job::new("fine", move || {
                    after.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            ];

            let report = run(jobs, mode);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(report.succeeded(), vec!["fine"]);
            assert_eq!(report.failed(), vec!["boom"]);

            let reason = match &report.outcomes().iter().find(|o| o.name == "boom").unwrap().status {
                JobStatus::Failed(reason) => reason.clone(),
                JobStatus::Succeeded => unreachable!(),
            };
            assert!(reason.contains("collector exploded"));
        }
    }

    #[test]
    fn test_parallel_respects_worker_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..10)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                Job::new(format!("job-{}", i), move || {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(30));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        let report = run(jobs, ExecutionMode::Parallel { max_workers: 3 });
        assert_eq!(report.succeeded().len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_parallel_outcomes_in_completion_order() {
        let jobs = vec![
            Job::new("slow", || {
                thread::sleep(Duration::from_millis(300));
                Ok(())
            }),
            Job::new("fast", || Ok(())),
        ];

        let report = run(jobs, ExecutionMode::Parallel { max_workers: 2 });
        assert_eq!(report.succeeded(), vec!["fast", "slow"]);
    }

    #[test]
    fn test_single_job_runs_on_calling_thread() {
        let caller = thread::current().id();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let slot = Arc::clone(&seen);

        let job = Job::new("only", move || {
            *slot.lock().unwrap() = Some(thread::current().id());
            Ok(())
        });

        run(vec![job], ExecutionMode::Parallel { max_workers: 4 });
        assert_eq!(*seen.lock().unwrap(), Some(caller));
    }

    #[test]
    fn test_zero_workers_still_runs_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = run(mixed_jobs(&calls), ExecutionMode::Parallel { max_workers: 0 });

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_partition(&report, 8);
    }

    #[test]
    fn test_empty_job_set() {
        let report = run(Vec::new(), ExecutionMode::Parallel { max_workers: 4 });
        assert!(report.outcomes().is_empty());
        assert!(report.all_succeeded());
    }

    struct NamedCollector(&'static str, bool);

    impl Collector for NamedCollector {
        fn name(&self) -> &'static str {
            self.0
        }

        fn collect(&self) -> Result<()> {
            if self.1 {
                Ok(())
            } else {
                bail!("{} unavailable", self.0)
            }
        }
    }

    #[test]
    fn test_job_from_collector() {
        let jobs = vec![
            Job::from_collector(NamedCollector("systemd", true)),
            Job::from_collector(NamedCollector("journald", false)),
        ];
        assert_eq!(jobs[0].name(), "systemd");

        let report = run(jobs, ExecutionMode::Serial);
        assert_eq!(report.succeeded(), vec!["systemd"]);
        assert_eq!(
            report.outcomes()[1].status,
            JobStatus::Failed("journald unavailable".to_string())
        );
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(ExecutionMode::from_flags(false, 8), ExecutionMode::Serial);
        assert_eq!(
            ExecutionMode::from_flags(true, 8),
            ExecutionMode::Parallel { max_workers: 8 }
        );
    }
}
