#![doc = include_str!("../README.md")]

//! Solver dispatch pool.
//!
//! Files are queued with [`Dispatcher::dispatch`] and launched as slots
//! free up; each launched task runs the external runner on one formula
//! file and pushes its outcome onto a channel. [`Dispatcher::clear_dispatches`]
//! is the step function the caller drives: it drains the queue into free
//! slots, then reports one completion at a time so the caller can
//! short-circuit on the first unsatisfiable block.

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    #[error("cannot launch runner {runner} on {filename}: {source}")]
    #[diagnostic(code(vipr2smt::exec::spawn))]
    Spawn {
        runner: String,
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read runner output for {filename}: {source}")]
    #[diagnostic(code(vipr2smt::exec::output))]
    Output {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker panicked while checking {filename}: {message}")]
    #[diagnostic(code(vipr2smt::exec::panic))]
    Panicked { filename: String, message: String },
}

/// What one step of [`Dispatcher::clear_dispatches`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A task completed and reported satisfiable.
    Sat,
    /// A task completed and reported anything else.
    Unsat,
    /// No queued or outstanding work remains.
    Done,
}

/// One execution slot set, bound to a machine identifier.
struct Machine {
    name: String,
    free_slots: AtomicU32,
}

struct Pending {
    filename: String,
    line: u64,
}

#[derive(Default)]
struct PoolState {
    pending: VecDeque<Pending>,
    outstanding: usize,
    next_task: u64,
    search_offset: usize,
}

struct TaskOutcome {
    task: u64,
    result: Result<bool, ExecError>,
}

struct Inner {
    runner: PathBuf,
    machines: Vec<Machine>,
    state: Mutex<PoolState>,
    /// PIDs of running subprocesses, for best-effort cancellation.
    running: Mutex<HashMap<u64, u32>>,
    outcome_tx: Sender<TaskOutcome>,
    outcome_rx: Receiver<TaskOutcome>,
}

impl Inner {
    /// A poisoned lock means some worker died mid-update; the pool
    /// keeps going with whatever state it left behind.
    fn state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn running(&self) -> MutexGuard<'_, HashMap<u64, u32>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Slot-limited dispatch pool over an external solver runner.
///
/// Cloning is cheap and shares the pool; every method takes `&self`, so
/// one dispatcher can be driven from the emitter threads and the verdict
/// loop at once.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Pool with the default machine set: three single-slot local
    /// workers.
    pub fn new(runner: PathBuf) -> Self {
        Self::with_machines(
            runner,
            vec![
                ("localhost".to_string(), 1),
                ("localhost".to_string(), 1),
                ("localhost".to_string(), 1),
            ],
        )
    }

    /// Pool with an explicit `(machine, slots)` list.
    pub fn with_machines(runner: PathBuf, machines: Vec<(String, u32)>) -> Self {
        let machines = machines
            .into_iter()
            .map(|(name, slots)| Machine {
                name,
                free_slots: AtomicU32::new(slots),
            })
            .collect();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();
        Dispatcher {
            inner: Arc::new(Inner {
                runner,
                machines,
                state: Mutex::new(PoolState::default()),
                running: Mutex::new(HashMap::new()),
                outcome_tx,
                outcome_rx,
            }),
        }
    }

    /// Queue a formula file for solving. Launches immediately when a
    /// slot is free.
    pub fn dispatch(&self, filename: String, line: u64) {
        let mut state = self.inner.state();
        tracing::debug!(%filename, line, "queueing dispatch");
        state.pending.push_back(Pending { filename, line });
        self.launch_ready(&mut state);
    }

    /// One scheduler step: fill free slots from the queue, then report
    /// the next completion. Blocks until a task finishes when any are
    /// outstanding.
    ///
    /// A task that failed to execute cancels the remaining work and
    /// surfaces its error.
    pub fn clear_dispatches(&self) -> Result<StepOutcome, ExecError> {
        {
            let mut state = self.inner.state();
            self.launch_ready(&mut state);
            if state.outstanding == 0 && state.pending.is_empty() {
                return Ok(StepOutcome::Done);
            }
        }

        let outcome = self
            .inner
            .outcome_rx
            .recv()
            .expect("dispatcher outcome channel closed");

        {
            let mut state = self.inner.state();
            state.outstanding -= 1;
            // The finished task's slot is free again; reuse it at once.
            self.launch_ready(&mut state);
        }

        tracing::debug!(task = outcome.task, "dispatch completed");
        match outcome.result {
            Ok(true) => Ok(StepOutcome::Sat),
            Ok(false) => Ok(StepOutcome::Unsat),
            Err(error) => {
                self.kill_dispatches();
                Err(error)
            }
        }
    }

    /// Best-effort cancellation of every outstanding worker process.
    pub fn kill_dispatches(&self) {
        let running = self.inner.running();
        for pid in running.values() {
            let _ = Command::new("kill")
                .arg("-9")
                .arg(pid.to_string())
                .status();
        }
    }

    /// Move queued work into free machine slots.
    fn launch_ready(&self, state: &mut PoolState) {
        while !state.pending.is_empty() {
            let Some(machine) = self.claim_machine(&mut state.search_offset) else {
                break;
            };
            let pending = state
                .pending
                .pop_front()
                .expect("queue checked non-empty above");
            let task = state.next_task;
            state.next_task += 1;
            state.outstanding += 1;

            tracing::debug!(
                task,
                filename = %pending.filename,
                machine = %self.inner.machines[machine].name,
                "launching dispatch"
            );

            let inner = Arc::clone(&self.inner);
            std::thread::spawn(move || run_task(inner, task, machine, pending.filename));
        }
    }

    /// Claim one slot, rotating the starting machine so consecutive
    /// dispatches spread across the set.
    fn claim_machine(&self, search_offset: &mut usize) -> Option<usize> {
        let machines = &self.inner.machines;
        for i in 0..machines.len() {
            let j = (i + *search_offset) % machines.len();
            let claimed = machines[j]
                .free_slots
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |slots| {
                    slots.checked_sub(1)
                });
            if claimed.is_ok() {
                *search_offset += 1;
                return Some(j);
            }
        }
        None
    }
}

/// Worker body: run the runner, scan stdout for a `sat` line, remove the
/// block file, release the slot, report the outcome.
///
/// The outcome send is unconditional: a worker that panicked still
/// reports, otherwise `clear_dispatches` would block on a completion
/// that never arrives.
fn run_task(inner: Arc<Inner>, task: u64, machine: usize, filename: String) {
    let result = catch_worker_panic(|| execute_runner(&inner, task, &filename), &filename);

    // The panic path can skip the registry cleanup in execute_runner.
    inner.running().remove(&task);

    if let Err(error) = std::fs::remove_file(&filename) {
        tracing::warn!(%filename, %error, "cannot remove completed block file");
    }

    inner.machines[machine].free_slots.fetch_add(1, Ordering::SeqCst);

    // The receiver only disappears when the whole pool is dropped.
    let _ = inner.outcome_tx.send(TaskOutcome { task, result });
}

/// Run `work`, turning a panic into an error outcome the verdict loop
/// can act on.
fn catch_worker_panic<F>(work: F, filename: &str) -> Result<bool, ExecError>
where
    F: FnOnce() -> Result<bool, ExecError>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => Err(ExecError::Panicked {
            filename: filename.to_string(),
            message: panic_message(&payload),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn execute_runner(inner: &Inner, task: u64, filename: &str) -> Result<bool, ExecError> {
    let mut child = Command::new(&inner.runner)
        .arg(filename)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            runner: inner.runner.display().to_string(),
            filename: filename.to_string(),
            source,
        })?;

    inner.running().insert(task, child.id());

    let outcome = scan_runner_output(&mut child).map_err(|source| ExecError::Output {
        filename: filename.to_string(),
        source,
    });

    inner.running().remove(&task);

    outcome
}

/// A single stdout line equal to `sat` marks the block satisfiable;
/// anything else, including abnormal exits, does not.
fn scan_runner_output(child: &mut std::process::Child) -> std::io::Result<bool> {
    let stdout = child
        .stdout
        .take()
        .expect("stdout was piped at spawn time");
    let mut sat = false;
    for line in BufReader::new(stdout).lines() {
        if line? == "sat" {
            sat = true;
        }
    }
    child.wait()?;
    Ok(sat)
}

/// Drive the pool to a verdict against the expected satisfiability.
///
/// Satisfiable blocks keep the loop going; the first unsatisfiable one
/// decides the run (the certificate is refuted), and a drained pool
/// means every block behaved as a valid certificate requires.
pub fn evaluate(dispatcher: &Dispatcher, expect_sat: bool) -> Result<bool, ExecError> {
    loop {
        match dispatcher.clear_dispatches()? {
            StepOutcome::Sat => continue,
            StepOutcome::Unsat => return Ok(!expect_sat),
            StepOutcome::Done => return Ok(expect_sat),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_runner(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("runner.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn write_block(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, "(check-sat)\n").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn empty_pool_reports_done() {
        let dispatcher = Dispatcher::new(PathBuf::from("/bin/true"));
        assert_eq!(dispatcher.clear_dispatches().unwrap(), StepOutcome::Done);
    }

    #[test]
    fn all_sat_blocks_confirm_an_expected_sat_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(dir.path(), "echo sat");
        let dispatcher = Dispatcher::new(runner);

        for i in 0..4 {
            let block = write_block(dir.path(), &format!("block-{i}"));
            dispatcher.dispatch(block, 0);
        }

        assert!(evaluate(&dispatcher, true).unwrap());
        assert!(!evaluate(&dispatcher, false).unwrap());
    }

    #[test]
    fn completed_block_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(dir.path(), "echo sat");
        let dispatcher = Dispatcher::new(runner);

        let block = write_block(dir.path(), "block-0");
        dispatcher.dispatch(block.clone(), 0);
        assert!(evaluate(&dispatcher, true).unwrap());
        assert!(!Path::new(&block).exists());
    }

    #[test]
    fn first_unsat_block_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(
            dir.path(),
            "case \"$1\" in *bad*) echo unsat ;; *) echo sat ;; esac",
        );
        let dispatcher = Dispatcher::new(runner);

        dispatcher.dispatch(write_block(dir.path(), "good-1"), 0);
        dispatcher.dispatch(write_block(dir.path(), "bad-2"), 0);
        dispatcher.dispatch(write_block(dir.path(), "good-3"), 0);

        // Expected sat, found an unsat block: the certificate fails.
        assert!(!evaluate(&dispatcher, true).unwrap());
        dispatcher.kill_dispatches();
    }

    #[test]
    fn unexpected_output_counts_as_unsat() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(dir.path(), "echo unknown");
        let dispatcher = Dispatcher::new(runner);

        dispatcher.dispatch(write_block(dir.path(), "block-0"), 0);
        assert_eq!(dispatcher.clear_dispatches().unwrap(), StepOutcome::Unsat);
    }

    #[test]
    fn queue_drains_through_a_single_slot() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(dir.path(), "echo sat");
        let dispatcher =
            Dispatcher::with_machines(runner, vec![("localhost".to_string(), 1)]);

        for i in 0..6 {
            let block = write_block(dir.path(), &format!("queued-{i}"));
            dispatcher.dispatch(block, 0);
        }

        let mut completions = 0;
        loop {
            match dispatcher.clear_dispatches().unwrap() {
                StepOutcome::Sat => completions += 1,
                StepOutcome::Unsat => panic!("runner always answers sat"),
                StepOutcome::Done => break,
            }
        }
        assert_eq!(completions, 6);
    }

    #[test]
    fn a_panicking_worker_becomes_an_error_outcome() {
        let result = catch_worker_panic(|| panic!("worker blew up"), "block-x");
        match result {
            Err(ExecError::Panicked { filename, message }) => {
                assert_eq!(filename, "block-x");
                assert!(message.contains("worker blew up"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn panic_payloads_render_str_string_and_opaque() {
        assert_eq!(panic_message(&"literal"), "literal");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u32), "unknown panic payload");
    }

    #[test]
    fn poisoned_locks_are_recovered_not_cascaded() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(dir.path(), "echo sat");
        let dispatcher = Dispatcher::new(runner);

        // Poison both shared locks from a deliberately panicking thread.
        let poisoner = dispatcher.clone();
        let _ = std::thread::spawn(move || {
            let _state = poisoner.inner.state.lock().unwrap();
            let _running = poisoner.inner.running.lock().unwrap();
            panic!("poison the dispatcher locks");
        })
        .join();
        assert!(dispatcher.inner.state.lock().is_err());

        // The pool still queues, launches and completes work.
        dispatcher.dispatch(write_block(dir.path(), "after-poison"), 0);
        assert!(evaluate(&dispatcher, true).unwrap());
        dispatcher.kill_dispatches();
    }

    #[test]
    fn missing_runner_surfaces_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(dir.path().join("no-such-runner"));
        dispatcher.dispatch(write_block(dir.path(), "block-0"), 0);
        let error = dispatcher.clear_dispatches().unwrap_err();
        assert!(matches!(error, ExecError::Spawn { .. }));
    }

    #[test]
    fn sat_must_be_its_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let runner = write_runner(dir.path(), "echo unsatisfied");
        let dispatcher = Dispatcher::new(runner);
        dispatcher.dispatch(write_block(dir.path(), "block-0"), 0);
        assert_eq!(dispatcher.clear_dispatches().unwrap(), StepOutcome::Unsat);
    }
}
