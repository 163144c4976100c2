use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, OwnedFd};

use anyhow::{Context as _, Result};
use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::{dup2_stderr, dup2_stdin, dup2_stdout, execvp, fork, pipe, ForkResult, Pid};
use tracing::{debug, warn};

use crate::jobs::JobTable;
use crate::parser::{Command, Pipeline};
use crate::redirects;
use crate::signal_handler::SignalController;

/// Snapshot of the interpreter's standard streams, restored when
/// dropped so every exit path leaves them as they were.
struct StdioGuard {
    stdin: OwnedFd,
    stdout: OwnedFd,
    stderr: OwnedFd,
}

impl StdioGuard {
    fn capture() -> Result<Self> {
        // try_clone_to_owned dups with close-on-exec, so the snapshot
        // never leaks into launched commands
        Ok(StdioGuard {
            stdin: io::stdin()
                .as_fd()
                .try_clone_to_owned()
                .context("failed to duplicate stdin")?,
            stdout: io::stdout()
                .as_fd()
                .try_clone_to_owned()
                .context("failed to duplicate stdout")?,
            stderr: io::stderr()
                .as_fd()
                .try_clone_to_owned()
                .context("failed to duplicate stderr")?,
        })
    }
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        let _ = dup2_stderr(&self.stderr);
        let _ = dup2_stdin(&self.stdin);
        let _ = dup2_stdout(&self.stdout);
    }
}

/// Execute one pipeline: launch every stage left to right, then either
/// wait for all of them (foreground) or leave them registered in the
/// job table (background).
///
/// All stages are launched before any wait so an early stage blocked on
/// a later one can never stall the launch sequence. A pipe or fork
/// failure aborts the remaining stages; stages already launched are
/// still waited on (foreground) or stay recorded in their job.
pub fn run_pipeline(
    pipeline: &Pipeline,
    jobs: &mut JobTable,
    signals: &SignalController,
) -> Result<()> {
    let _stdio = StdioGuard::capture()?;
    let _foreground = signals.foreground();

    let mut pids = Vec::with_capacity(pipeline.commands.len());
    let mut handle = None;
    let launched = launch_stages(pipeline, jobs, &mut pids, &mut handle);

    if pipeline.background {
        if let Some(handle) = handle {
            if let Some(first) = jobs.first_pid(handle) {
                println!("[{}] {}", jobs.job_number(handle), first);
            }
        }
    } else {
        for &pid in &pids {
            match waitpid(pid, None) {
                Ok(status) => debug!(%pid, ?status, "foreground stage finished"),
                Err(Errno::ECHILD) => {}
                Err(e) => warn!(%pid, "waitpid failed: {e}"),
            }
        }
    }

    launched
}

/// Fork every stage of the pipeline, wiring adjacent stages together.
///
/// At most two pipes are alive at any instant: the one feeding the
/// current stage and the one it writes to. The parent drops each end
/// the moment it is no longer needed; a write end held too long would
/// keep the reader from ever seeing end-of-stream.
fn launch_stages(
    pipeline: &Pipeline,
    jobs: &mut JobTable,
    pids: &mut Vec<Pid>,
    handle: &mut Option<usize>,
) -> Result<()> {
    let total = pipeline.commands.len();
    let mut prev_read: Option<OwnedFd> = None;

    for (position, command) in pipeline.commands.iter().enumerate() {
        let last = position == total - 1;
        let mut current_pipe = if last {
            None
        } else {
            Some(pipe().context("failed to create pipe")?)
        };

        match unsafe { fork() }.context("failed to fork")? {
            ForkResult::Child => {
                if let Some(read_end) = prev_read.as_ref() {
                    if let Err(e) = dup2_stdin(read_end) {
                        eprintln!("msh: Error. {e}");
                    }
                }
                if let Some((_, write_end)) = current_pipe.as_ref() {
                    if let Err(e) = dup2_stdout(write_end) {
                        eprintln!("msh: Error. {e}");
                    }
                }
                // close this process's copies of every pipe end; the
                // streams now point where they should
                drop(prev_read.take());
                drop(current_pipe.take());

                // an explicit redirection overrides the pipe binding
                redirects::apply_redirects(command);

                exec_command(&command.argv);
            }
            ForkResult::Parent { child } => {
                debug!(%child, position, last, "launched pipeline stage");
                pids.push(child);

                if pipeline.background {
                    let handle =
                        *handle.get_or_insert_with(|| jobs.register(&pipeline.line));
                    jobs.append_pid(handle, child);
                }

                // keep only the read end feeding the next stage; the
                // previous pipe and this write end close here
                prev_read = current_pipe.take().map(|(read_end, _)| read_end);
            }
        }
    }

    Ok(())
}

/// Replace the current process image with the command's program. On
/// failure, report and terminate this process only; siblings already
/// launched are unaffected.
fn exec_command(argv: &[String]) -> ! {
    let program = argv.first().cloned().unwrap_or_default();
    let args: Vec<CString> = argv
        .iter()
        .filter_map(|arg| CString::new(arg.as_str()).ok())
        .collect();

    if let Some(name) = args.first() {
        let _ = execvp(name, &args);
    }

    eprintln!("{}: Command not found", program);
    std::process::exit(1);
}
