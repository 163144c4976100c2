/// A single command of a pipeline: its argument vector plus any
/// redirection targets attached to it. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl Command {
    fn new() -> Self {
        Command {
            argv: Vec::new(),
            input: None,
            output: None,
            error: None,
        }
    }
}

/// An ordered sequence of commands connected by pipes, plus the raw
/// instruction text kept for job display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub background: bool,
    pub line: String,
}

/// Parse one input line into a pipeline.
/// e.g. "cat < in.txt | grep msh | wc -l > out.txt &"
pub fn parse_line(input: &str) -> Option<Pipeline> {
    let line = input.trim();
    if line.is_empty() {
        return None;
    }

    let background = line.ends_with('&') && !line.ends_with(">&");
    let body = if background {
        line[..line.len() - 1].trim_end()
    } else {
        line
    };

    let tokens = tokenize(body);
    if tokens.is_empty() {
        return None;
    }

    let mut commands = Vec::new();
    let mut current = Command::new();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "|" => {
                if current.argv.is_empty() {
                    eprintln!("msh: syntax error near '|'");
                    return None;
                }
                commands.push(std::mem::replace(&mut current, Command::new()));
            }
            op @ ("<" | ">" | "2>" | ">&") => {
                let Some(target) = tokens.get(i + 1) else {
                    eprintln!("msh: expected file name after '{op}'");
                    return None;
                };
                match op {
                    "<" => current.input = Some(target.clone()),
                    ">" => current.output = Some(target.clone()),
                    _ => current.error = Some(target.clone()),
                }
                i += 1;
            }
            word => current.argv.push(word.to_string()),
        }
        i += 1;
    }

    if current.argv.is_empty() {
        eprintln!("msh: syntax error near '|'");
        return None;
    }
    commands.push(current);

    Some(Pipeline {
        commands,
        background,
        line: line.to_string(),
    })
}

/// Split a line into words and operator tokens, honoring single and
/// double quotes for grouping.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = ' ';
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = c;
            }
            '"' | '\'' if in_quotes && c == quote_char => {
                in_quotes = false;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '|' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push("|".to_string());
            }
            '<' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push("<".to_string());
            }
            '>' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(">&".to_string());
                } else {
                    tokens.push(">".to_string());
                }
            }
            '2' if !in_quotes && current.is_empty() && chars.peek() == Some(&'>') => {
                chars.next();
                tokens.push("2>".to_string());
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_command() {
        let pipeline = parse_line("ls -l /tmp").unwrap();
        assert_eq!(pipeline.commands.len(), 1);
        assert_eq!(pipeline.commands[0].argv, vec!["ls", "-l", "/tmp"]);
        assert!(!pipeline.background);
        assert_eq!(pipeline.line, "ls -l /tmp");
    }

    #[test]
    fn parses_three_stage_pipeline() {
        let pipeline = parse_line("cat f | grep x | wc -l").unwrap();
        assert_eq!(pipeline.commands.len(), 3);
        assert_eq!(pipeline.commands[0].argv, vec!["cat", "f"]);
        assert_eq!(pipeline.commands[1].argv, vec!["grep", "x"]);
        assert_eq!(pipeline.commands[2].argv, vec!["wc", "-l"]);
    }

    #[test]
    fn parses_redirections_per_command() {
        let pipeline = parse_line("sort < in.txt | head -1 > out.txt 2> err.txt").unwrap();
        assert_eq!(pipeline.commands[0].input.as_deref(), Some("in.txt"));
        assert_eq!(pipeline.commands[0].output, None);
        assert_eq!(pipeline.commands[1].output.as_deref(), Some("out.txt"));
        assert_eq!(pipeline.commands[1].error.as_deref(), Some("err.txt"));
    }

    #[test]
    fn error_redirect_operator_variant() {
        let pipeline = parse_line("make >& build.log").unwrap();
        assert_eq!(pipeline.commands[0].error.as_deref(), Some("build.log"));
        assert!(!pipeline.background);
    }

    #[test]
    fn trailing_ampersand_marks_background() {
        let pipeline = parse_line("sleep 5 &").unwrap();
        assert!(pipeline.background);
        assert_eq!(pipeline.commands[0].argv, vec!["sleep", "5"]);
        // the raw text keeps the marker for job display
        assert_eq!(pipeline.line, "sleep 5 &");
    }

    #[test]
    fn quotes_group_words() {
        let pipeline = parse_line("printf 'a b' \"c|d\"").unwrap();
        assert_eq!(pipeline.commands[0].argv, vec!["printf", "a b", "c|d"]);
    }

    #[test]
    fn empty_and_invalid_lines_yield_none() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("a | | b"), None);
        assert_eq!(parse_line("cat >"), None);
    }

    #[test]
    fn redirects_without_spaces() {
        let pipeline = parse_line("wc -l<in.txt>out.txt").unwrap();
        assert_eq!(pipeline.commands[0].argv, vec!["wc", "-l"]);
        assert_eq!(pipeline.commands[0].input.as_deref(), Some("in.txt"));
        assert_eq!(pipeline.commands[0].output.as_deref(), Some("out.txt"));
    }
}
