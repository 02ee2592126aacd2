//! Analysis server process supervision.
//!
//! A project's server goes `STOPPED -> STARTING -> RUNNING -> STOPPED`. A
//! failed start puts the project in a cooldown during which further
//! launches are refused, so a broken install is not relaunched on every
//! keystroke.

use crate::config::ServerConfig;
use crate::error::{BridgeError, Result};
use crate::project::Project;
use crossbeam_channel::Receiver;
use regex::Regex;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for stderr output once stdout has closed.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Stderr lines kept for failure reports.
const STDERR_BACKLOG: usize = 256;

/// A launched server.
pub trait ServerProcess: Send {
    /// Returns the next line of output, or `None` once output is exhausted.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Closes the server's input and waits for it to exit.
    fn terminate(&mut self) -> io::Result<()>;
}

/// Starts server processes.
pub trait Launcher: Send + Sync {
    /// Launches a server rooted at `root`.
    fn launch(&self, root: &Path) -> io::Result<Box<dyn ServerProcess>>;
}

/// Launches the configured server command as a child process.
pub struct CommandLauncher {
    config: ServerConfig,
}

impl CommandLauncher {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        if cfg!(windows) {
            // Lets `tern.cmd` shims from npm resolve.
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.config.command);
            cmd
        } else {
            Command::new(&self.config.command)
        }
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, root: &Path) -> io::Result<Box<dyn ServerProcess>> {
        let mut cmd = self.command();
        cmd.args(&self.config.args)
            .current_dir(self.config.working_dir.as_deref().unwrap_or(root))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if cfg!(target_os = "macos") {
            // GUI apps on macOS do not inherit the shell's PATH.
            if let Some(mut path) = std::env::var_os("PATH") {
                path.push(":/usr/local/bin");
                cmd.env("PATH", path);
            }
        }

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Failed to get stdout"))?;

        let (stderr_tx, stderr_rx) = crossbeam_channel::bounded(STDERR_BACKLOG);
        if let Some(stderr) = child.stderr.take() {
            // Keeps the pipe drained for the whole life of the server.
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    log::debug!("tern: {}", line);
                    let _ = stderr_tx.try_send(format!("{}\n", line));
                }
            });
        }

        log::info!("Launched '{}' in {}", self.config.command, root.display());

        Ok(Box::new(ChildProcess {
            child,
            stdout: BufReader::new(stdout),
            stderr: stderr_rx,
        }))
    }
}

/// A server running as a child process.
struct ChildProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Receiver<String>,
}

impl ServerProcess for ChildProcess {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? > 0 {
            return Ok(Some(line));
        }
        // Stdout is exhausted; hand out what the server wrote to stderr.
        Ok(self.stderr.recv_timeout(STDERR_GRACE).ok())
    }

    fn terminate(&mut self) -> io::Result<()> {
        // Closing stdin is the server's shutdown signal.
        drop(self.child.stdin.take());
        let status = self.child.wait()?;
        log::debug!("Server exited with {}", status);
        Ok(())
    }
}

fn listening_regex() -> &'static Regex {
    static LISTENING: OnceLock<Regex> = OnceLock::new();
    LISTENING.get_or_init(|| Regex::new(r"^Listening on port (\d+)").expect("port pattern is valid"))
}

/// Extracts the port from the server's startup announcement.
pub fn parse_listening_port(line: &str) -> Option<u16> {
    listening_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A port to send requests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPort {
    pub port: u16,
    /// True if the port was remembered or read from a port file rather than
    /// announced by a server launched just now. Such a port may be stale.
    pub cached: bool,
}

/// Owns the lifecycle of project servers.
pub struct ProcessSupervisor {
    launcher: Arc<dyn Launcher>,
    cooldown: Duration,
    port_file: String,
}

impl ProcessSupervisor {
    pub fn new(launcher: Arc<dyn Launcher>, cooldown: Duration, port_file: impl Into<String>) -> Self {
        Self {
            launcher,
            cooldown,
            port_file: port_file.into(),
        }
    }

    /// Returns a port for the project's server, launching one if needed.
    ///
    /// `invalidate` names a port that just failed; it is not handed out
    /// again, and a server this session launched on it is stopped first.
    pub fn ensure_port(&self, project: &mut Project, invalidate: Option<u16>) -> Result<ServerPort> {
        if let Some(port) = project.port {
            if Some(port) != invalidate {
                return Ok(ServerPort { port, cached: true });
            }
            log::info!("Port {} of {} is stale", port, project.root().display());
            self.terminate(project);
            project.port = None;
        }

        if let Some(port) = self.read_port_file(project.root()) {
            if Some(port) != invalidate {
                log::info!("Using server on port {} from port file", port);
                project.port = Some(port);
                return Ok(ServerPort { port, cached: true });
            }
        }

        let port = self.spawn(project)?;
        project.port = Some(port);
        Ok(ServerPort { port, cached: false })
    }

    /// Launches a server for the project and waits for its port.
    pub fn spawn(&self, project: &mut Project) -> Result<u16> {
        if let Some(failed) = project.last_failed {
            let elapsed = failed.elapsed();
            if elapsed < self.cooldown {
                return Err(BridgeError::CoolingDown {
                    remaining: self.cooldown - elapsed,
                });
            }
        }

        self.terminate(project);

        let mut process = match self.launcher.launch(project.root()) {
            Ok(process) => process,
            Err(e) => {
                log::error!("Failed to launch server for {}: {}", project.root().display(), e);
                project.last_failed = Some(Instant::now());
                return Err(BridgeError::SpawnFailed {
                    output: e.to_string(),
                });
            }
        };

        let mut output = String::new();
        loop {
            match process.read_line() {
                Ok(Some(line)) => {
                    if let Some(port) = parse_listening_port(&line) {
                        log::info!("Server for {} listening on port {}", project.root().display(), port);
                        project.process = Some(process);
                        return Ok(port);
                    }
                    output.push_str(&line);
                }
                Ok(None) => break,
                Err(e) => {
                    output.push_str(&e.to_string());
                    break;
                }
            }
        }

        log::error!("Server for {} exited before listening", project.root().display());
        project.last_failed = Some(Instant::now());
        if let Err(e) = process.terminate() {
            log::warn!("Failed to reap server: {}", e);
        }
        Err(BridgeError::SpawnFailed {
            output: output.trim_end().to_string(),
        })
    }

    /// Stops the server this session launched for the project, if any.
    pub fn terminate(&self, project: &mut Project) {
        let Some(mut process) = project.process.take() else {
            return;
        };
        log::info!("Stopping server for {}", project.root().display());
        if let Err(e) = process.terminate() {
            log::warn!("Failed to stop server for {}: {}", project.root().display(), e);
        }
        project.port = None;
    }

    fn read_port_file(&self, root: &Path) -> Option<u16> {
        let path = root.join(&self.port_file);
        let content = fs::read_to_string(&path).ok()?;
        match content.trim().parse() {
            Ok(port) => Some(port),
            Err(e) => {
                log::warn!("Ignoring malformed port file {}: {}", path.display(), e);
                None
            }
        }
    }
}
