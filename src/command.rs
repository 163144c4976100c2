use std::env;

use nix::sys::stat::{umask, Mode};
use tracing::debug;

use crate::jobs::JobTable;
use crate::signal_handler::SignalController;

/// The builtin surface dispatched by the interpreter. Everything else
/// is launched as an external pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    Cd(Option<String>),
    Umask(Option<String>),
    Exit,
    Jobs,
    Fg(Option<usize>),
}

impl Builtin {
    /// Recognize a builtin from the first command's argument vector.
    pub fn parse(argv: &[String]) -> Option<Self> {
        match argv.first().map(String::as_str)? {
            "cd" => Some(Builtin::Cd(argv.get(1).cloned())),
            "umask" => Some(Builtin::Umask(argv.get(1).cloned())),
            "exit" => Some(Builtin::Exit),
            "jobs" => Some(Builtin::Jobs),
            // a non-numeric argument maps to 0, which the job table
            // rejects as out of range
            "fg" => Some(Builtin::Fg(
                argv.get(1).map(|arg| arg.parse().unwrap_or(0)),
            )),
            _ => None,
        }
    }

    pub fn execute(
        self,
        jobs: &mut JobTable,
        signals: &SignalController,
        mask: &mut Mode,
    ) {
        match self {
            Builtin::Cd(path) => {
                let home = env::var("HOME").unwrap_or_else(|_| "/".to_string());
                let target = path.as_deref().unwrap_or(&home);
                if let Err(e) = env::set_current_dir(target) {
                    eprintln!("cd: {}", e);
                }
            }

            Builtin::Umask(arg) => match arg {
                None => print_mask(*mask),
                Some(text) => match parse_mask(&text) {
                    Some(new_mask) => {
                        umask(new_mask);
                        *mask = new_mask;
                        debug!(mask = %format!("{:04o}", new_mask.bits()), "mask set");
                        print_mask(new_mask);
                    }
                    None => eprintln!("{}: Error. Invalid argument", text),
                },
            },

            Builtin::Exit => {
                jobs.kill_all();
                std::process::exit(0);
            }

            Builtin::Jobs => {
                for (number, status, instruction) in jobs.list() {
                    println!("[{}] {}\t{}", number, status, instruction);
                }
            }

            Builtin::Fg(number) => jobs.foreground(number, signals),
        }
    }
}

fn print_mask(mask: Mode) {
    println!("{:04o}", mask.bits());
}

/// An octal mask string: 1 to 4 digits, each 0-7.
fn parse_mask(text: &str) -> Option<Mode> {
    if text.is_empty() || text.len() > 4 || !text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    let bits = u32::from_str_radix(text, 8).ok()?;
    Some(Mode::from_bits_truncate(bits as libc::mode_t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn recognizes_builtins_by_first_word() {
        assert_eq!(Builtin::parse(&argv(&["cd"])), Some(Builtin::Cd(None)));
        assert_eq!(
            Builtin::parse(&argv(&["cd", "/tmp"])),
            Some(Builtin::Cd(Some("/tmp".to_string())))
        );
        assert_eq!(Builtin::parse(&argv(&["exit"])), Some(Builtin::Exit));
        assert_eq!(Builtin::parse(&argv(&["jobs"])), Some(Builtin::Jobs));
        assert_eq!(Builtin::parse(&argv(&["ls", "-l"])), None);
    }

    #[test]
    fn fg_argument_resolution() {
        assert_eq!(Builtin::parse(&argv(&["fg"])), Some(Builtin::Fg(None)));
        assert_eq!(
            Builtin::parse(&argv(&["fg", "2"])),
            Some(Builtin::Fg(Some(2)))
        );
        // not a number: carried as 0 so the table reports no such job
        assert_eq!(
            Builtin::parse(&argv(&["fg", "abc"])),
            Some(Builtin::Fg(Some(0)))
        );
    }

    #[test]
    fn valid_octal_masks_parse() {
        assert_eq!(parse_mask("022"), Some(Mode::from_bits_truncate(0o022)));
        assert_eq!(parse_mask("0"), Some(Mode::empty()));
        assert_eq!(parse_mask("777"), Some(Mode::from_bits_truncate(0o777)));
        assert_eq!(parse_mask("0777"), Some(Mode::from_bits_truncate(0o777)));
    }

    #[test]
    fn invalid_mask_strings_are_rejected() {
        assert_eq!(parse_mask("999"), None);
        assert_eq!(parse_mask("08"), None);
        assert_eq!(parse_mask("12345"), None);
        assert_eq!(parse_mask(""), None);
        assert_eq!(parse_mask("2a"), None);
    }
}
