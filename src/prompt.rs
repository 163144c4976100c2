use colored::Colorize;

pub struct Prompt {
    rendered: String,
}

impl Prompt {
    pub fn new() -> Self {
        let user = whoami::username();
        let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
        let identity = format!("{}@{}", user, host);
        let rendered = format!("{} msh> ", identity.as_str().green());
        Prompt { rendered }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// The exact bytes the SIGINT handler writes to redisplay the
    /// prompt; rendered once so the handler stays async-signal-safe.
    pub fn bytes(&self) -> &[u8] {
        self.rendered.as_bytes()
    }
}
