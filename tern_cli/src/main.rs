//! Tern Bridge - run one Tern query against a file.
//!
//! Usage: tern-bridge <FILE> <OFFSET> [completions|hints|type|definition]
//!
//! The server command defaults to `tern --no-port-file` and can be replaced
//! with the `TERN_BRIDGE_COMMAND` environment variable.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tern_bridge_client::{BridgeConfig, ServerConfig};
use tern_bridge_core::TextBuffer;
use tern_bridge_ui::{DocumentationOutcome, PanelRenderer, TernManager};

const USAGE: &str = "Usage: tern-bridge <FILE> <OFFSET> [completions|hints|type|definition]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Completions,
    Hints,
    Type,
    Definition,
}

impl Command {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "completions" => Some(Command::Completions),
            "hints" => Some(Command::Hints),
            "type" => Some(Command::Type),
            "definition" => Some(Command::Definition),
            _ => None,
        }
    }
}

struct Args {
    file: PathBuf,
    offset: usize,
    command: Command,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let file = PathBuf::from(args.get(1)?);
    let offset = args.get(2)?.parse().ok()?;
    let command = match args.get(3) {
        Some(name) => Command::parse(name)?,
        None => Command::Completions,
    };
    Some(Args { file, offset, command })
}

fn server_config() -> ServerConfig {
    let Ok(command_line) = env::var("TERN_BRIDGE_COMMAND") else {
        return ServerConfig::tern();
    };
    let mut parts = command_line.split_whitespace().map(str::to_string);
    match parts.next() {
        Some(command) => ServerConfig::new(command, parts.collect()),
        None => ServerConfig::tern(),
    }
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let Some(args) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };

    let path = match fs::canonicalize(&args.file) {
        Ok(path) => path,
        Err(e) => {
            log::error!("Failed to open file '{}': {}", args.file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let buffer = match TextBuffer::from_file(&path) {
        Ok(buffer) => buffer,
        Err(e) => {
            log::error!("Failed to read file '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let offset = args.offset.min(buffer.len_chars());

    let config = BridgeConfig::default().with_server(server_config());
    let mut manager = match TernManager::new(config, PanelRenderer::new("tern_arghint")) {
        Ok(manager) => manager,
        Err(e) => {
            log::error!("Failed to start the push scheduler: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(key) = manager.did_open(Some(&path), true) else {
        eprintln!("Not a JavaScript file: {}", path.display());
        return ExitCode::FAILURE;
    };
    log::info!("Running {:?} at offset {} of {}", args.command, offset, path.display());

    let found = match args.command {
        Command::Completions => {
            let entries = manager.completions(&key, &buffer, offset);
            for entry in &entries {
                println!("{}\t{}", entry.hint, entry.replacement);
            }
            !entries.is_empty()
        }
        Command::Hints => match manager.show_documentation(&key, &buffer, offset) {
            DocumentationOutcome::Shown => {
                println!("{}", manager.hints().renderer().contents());
                true
            }
            DocumentationOutcome::OnWeb { url } => {
                println!("Could not find documentation text, but documentation is available on the web: {}", url);
                true
            }
            DocumentationOutcome::NotFound => false,
        },
        Command::Type => match manager.show_type(&key, &buffer, offset) {
            Some(ty) => {
                println!("{}", ty);
                true
            }
            None => false,
        },
        Command::Definition => match manager.jump_to_definition(&key, &buffer, offset) {
            Some(target) => {
                println!("{}", target.encoded());
                true
            }
            None => false,
        },
    };

    for error in manager.notifications_mut().take_errors() {
        eprintln!("{}", error.message);
    }
    if let Some(status) = manager.notifications().status_line() {
        eprintln!("{}", status);
    }

    manager.shutdown_all();

    if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
