use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::signal_handler::SignalController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Done => write!(f, "Done"),
        }
    }
}

/// One background pipeline: the instruction text that produced it and
/// the process ids it spawned, in launch order.
#[derive(Debug)]
pub struct Job {
    pub instruction: String,
    pub pids: Vec<Pid>,
    completed: bool,
}

impl Job {
    fn new(instruction: &str) -> Self {
        Job {
            instruction: instruction.to_string(),
            pids: Vec::new(),
            completed: false,
        }
    }

    /// Non-blocking completion check. Once every pid has been observed
    /// as exited the result is cached and no further polling happens.
    /// Every pid is polled on each pass; the scan does not stop at the
    /// first still-running process.
    pub fn refresh_status(&mut self) -> bool {
        if self.completed {
            return true;
        }

        let mut all_exited = true;
        for &pid in &self.pids {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    debug!(%pid, code, "background process exited");
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    debug!(%pid, ?signal, "background process killed by signal");
                }
                Ok(WaitStatus::StillAlive) => all_exited = false,
                // already reaped elsewhere counts as exited
                Err(Errno::ECHILD) => {}
                Ok(status) => {
                    debug!(%pid, ?status, "background process not exited");
                    all_exited = false;
                }
                Err(e) => {
                    warn!(%pid, "waitpid failed: {e}");
                    all_exited = false;
                }
            }
        }

        if all_exited {
            self.completed = true;
        }
        all_exited
    }
}

/// Ordered collection of background jobs. Position encodes the 1-based
/// job number; removal shift-compacts so the numbering never has gaps.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    /// Append a new job with an empty pid list. Returns a handle used
    /// to record pids as the pipeline's stages are launched.
    pub fn register(&mut self, instruction: &str) -> usize {
        self.jobs.push(Job::new(instruction));
        debug!(number = self.jobs.len(), instruction, "registered job");
        self.jobs.len() - 1
    }

    pub fn append_pid(&mut self, handle: usize, pid: Pid) {
        if let Some(job) = self.jobs.get_mut(handle) {
            job.pids.push(pid);
        }
    }

    /// Externally visible job number for a handle.
    pub fn job_number(&self, handle: usize) -> usize {
        handle + 1
    }

    pub fn first_pid(&self, handle: usize) -> Option<Pid> {
        self.jobs.get(handle).and_then(|job| job.pids.first().copied())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Status of every job in table order, then one compaction pass
    /// removing the completed ones. Removal is deferred until after the
    /// full pass so the numbers reported are consistent.
    pub fn list(&mut self) -> Vec<(usize, JobStatus, String)> {
        let mut listed = Vec::with_capacity(self.jobs.len());
        for (index, job) in self.jobs.iter_mut().enumerate() {
            let status = if job.refresh_status() {
                JobStatus::Done
            } else {
                JobStatus::Running
            };
            listed.push((index + 1, status, job.instruction.clone()));
        }
        self.jobs.retain(|job| !job.completed);
        listed
    }

    /// Block until the resolved job's processes have all exited, then
    /// remove it. No argument resolves to job 1, the oldest active job.
    pub fn foreground(&mut self, number: Option<usize>, signals: &SignalController) {
        let number = number.unwrap_or(1);

        if self.jobs.is_empty() {
            println!("fg: There are no jobs available");
            return;
        }

        if number < 1 || number > self.jobs.len() {
            eprintln!("fg: Error. No such job");
            return;
        }
        let index = number - 1;

        // SIGINT must reach the waited-on processes, not kill the shell
        let _guard = signals.foreground();

        let job = &mut self.jobs[index];
        if job.refresh_status() {
            // already exited; nothing left to wait for
            println!("fg: job has terminated");
            println!("[{}] Done\t{}", number, job.instruction);
        } else {
            println!("{}", job.instruction);
            for &pid in &job.pids {
                match waitpid(pid, None) {
                    Ok(status) => debug!(%pid, ?status, "foreground wait finished"),
                    Err(Errno::ECHILD) => {}
                    Err(e) => warn!(%pid, "waitpid failed: {e}"),
                }
            }
        }

        self.jobs.remove(index);
    }

    /// Forcefully terminate every recorded process of every job. Pids
    /// that already exited make `kill` fail with ESRCH, which is
    /// ignored.
    pub fn kill_all(&mut self) {
        for job in &self.jobs {
            for &pid in &job.pids {
                if let Err(e) = kill(pid, Signal::SIGKILL) {
                    debug!(%pid, "kill failed: {e}");
                }
            }
        }
        self.jobs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a pid that was never our child: waitpid yields ECHILD, which the
    // table treats as already exited
    fn stale_job(table: &mut JobTable, instruction: &str) -> usize {
        let handle = table.register(instruction);
        table.append_pid(handle, Pid::from_raw(99_999_999));
        handle
    }

    #[test]
    fn listing_empty_table_prints_nothing_and_mutates_nothing() {
        let mut table = JobTable::default();
        assert!(table.list().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn registration_numbers_jobs_in_order() {
        let mut table = JobTable::default();
        let a = table.register("sleep 1 &");
        let b = table.register("sleep 2 &");
        let c = table.register("sleep 3 &");
        assert_eq!(table.job_number(a), 1);
        assert_eq!(table.job_number(b), 2);
        assert_eq!(table.job_number(c), 3);
    }

    #[test]
    fn listing_prunes_completed_jobs_after_the_pass() {
        let mut table = JobTable::default();
        stale_job(&mut table, "sleep 1 &");
        stale_job(&mut table, "sleep 2 &");

        let listed = table.list();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|(_, status, _)| *status == JobStatus::Done));
        assert_eq!(listed[0].0, 1);
        assert_eq!(listed[1].0, 2);
        assert!(table.is_empty());
    }

    #[test]
    fn completed_cache_is_sticky() {
        let mut job = Job::new("true &");
        job.pids.push(Pid::from_raw(99_999_999));
        assert!(job.refresh_status());
        // second call must not poll again; the cache answers
        assert!(job.refresh_status());
    }

    #[test]
    fn fg_without_argument_resolves_to_oldest_job() {
        let mut table = JobTable::default();
        stale_job(&mut table, "first &");
        stale_job(&mut table, "second &");

        table.foreground(None, &SignalController::new());

        assert_eq!(table.len(), 1);
        assert_eq!(table.jobs[0].instruction, "second &");
        assert_eq!(table.job_number(0), 1);
    }

    #[test]
    fn fg_out_of_range_leaves_table_unchanged() {
        let mut table = JobTable::default();
        stale_job(&mut table, "first &");
        stale_job(&mut table, "second &");

        table.foreground(Some(7), &SignalController::new());
        assert_eq!(table.len(), 2);

        table.foreground(Some(0), &SignalController::new());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn kill_all_terminates_recorded_processes() {
        let mut table = JobTable::default();
        let mut children = Vec::new();
        for _ in 0..2 {
            let child = std::process::Command::new("sleep")
                .arg("30")
                .spawn()
                .expect("spawn sleep");
            let handle = table.register("sleep 30 &");
            table.append_pid(handle, Pid::from_raw(child.id() as i32));
            children.push(child);
        }

        table.kill_all();
        assert!(table.is_empty());

        for mut child in children {
            let status = child.wait().expect("wait killed child");
            assert!(!status.success());
        }
    }
}
