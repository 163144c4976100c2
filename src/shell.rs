use std::io::{self, BufRead, Write};

use anyhow::Result;
use nix::sys::stat::{umask, Mode};
use tracing::debug;

use crate::command::Builtin;
use crate::jobs::JobTable;
use crate::parser;
use crate::pipes;
use crate::prompt::Prompt;
use crate::signal_handler::SignalController;

pub struct Shell {
    prompt: Prompt,
    jobs: JobTable,
    signals: SignalController,
    mask: Mode,
}

impl Shell {
    pub fn new() -> Result<Self> {
        let prompt = Prompt::new();

        let signals = SignalController::new();
        signals.install(prompt.bytes())?;

        let mask = Mode::from_bits_truncate(0o022);
        umask(mask);

        Ok(Shell {
            prompt,
            jobs: JobTable::default(),
            signals,
            mask,
        })
    }

    /// Read-eval loop: prompt, read a line, dispatch, until EOF or
    /// `exit`.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            print!("{}", self.prompt.as_str());
            let _ = io::stdout().flush();

            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => self.dispatch(&line),
                Err(e) => {
                    eprintln!("msh: {}", e);
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, line: &str) {
        let Some(pipeline) = parser::parse_line(line) else {
            return;
        };
        debug!(?pipeline, "dispatching");

        // builtins dispatch on the first command only
        let Some(first) = pipeline.commands.first() else {
            return;
        };
        if let Some(builtin) = Builtin::parse(&first.argv) {
            builtin.execute(&mut self.jobs, &self.signals, &mut self.mask);
            return;
        }

        if let Err(e) = pipes::run_pipeline(&pipeline, &mut self.jobs, &self.signals) {
            eprintln!("msh: {}", e);
        }
    }
}
