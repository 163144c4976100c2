use std::env;
use std::process;

mod command;
mod jobs;
mod parser;
mod pipes;
mod prompt;
mod redirects;
mod shell;
mod signal_handler;

fn print_help() {
    println!("msh - minimal command interpreter");
    println!();
    println!("Usage: msh [OPTIONS]");
    println!("  -h, --help       Print this help");
    println!("  -v, --version    Print version");
}

fn print_version() {
    println!("msh v{}", env!("CARGO_PKG_VERSION"));
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        process::exit(0);
    }

    if args.iter().any(|a| a == "-v" || a == "--version" || a == "-V") {
        print_version();
        process::exit(0);
    }

    // silent unless RUST_LOG asks for output; diagnostics go to stderr
    // so they never mix with command output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match shell::Shell::new() {
        Ok(mut shell) => shell.run(),
        Err(e) => {
            eprintln!("msh: {}", e);
            process::exit(1);
        }
    }
}
