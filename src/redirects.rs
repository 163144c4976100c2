use std::fs::{File, OpenOptions};

use nix::unistd::{dup2_stderr, dup2_stdin, dup2_stdout};
use tracing::debug;

use crate::parser::Command;

/// Which standard stream a redirection rebinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

/// Rebind the standard streams of the current (already forked) process
/// according to the command's redirection targets.
///
/// Runs after pipe wiring, so an explicit redirection wins over a pipe
/// binding. A target that cannot be opened is reported and skipped; the
/// command still runs with whatever streams it has at that point.
pub fn apply_redirects(command: &Command) {
    if let Some(path) = &command.error {
        redirect(path, Stream::Stderr);
    }
    if let Some(path) = &command.input {
        redirect(path, Stream::Stdin);
    }
    if let Some(path) = &command.output {
        redirect(path, Stream::Stdout);
    }
}

fn redirect(path: &str, stream: Stream) {
    let opened = match stream {
        Stream::Stdin => File::open(path),
        Stream::Stdout | Stream::Stderr => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path),
    };

    let file = match opened {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{}: Error. {}", path, e);
            return;
        }
    };

    debug!(path, ?stream, "rebinding standard stream");
    let bound = match stream {
        Stream::Stdin => dup2_stdin(&file),
        Stream::Stdout => dup2_stdout(&file),
        Stream::Stderr => dup2_stderr(&file),
    };
    if let Err(e) = bound {
        eprintln!("{}: Error. {}", path, e);
    }
    // `file` drops here, releasing the now-redundant descriptor
}
