//! Headless Neovim adapter.
//!
//! Each engine owns one `nvim --headless` process listening on a socket inside
//! its own temporary directory. Requests are single `--remote-expr`
//! round-trips whose result is JSON-encoded on the server side, so one call
//! returns the whole state.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{Cursor, EditorEngine, EngineLauncher, EngineSnapshot, LaunchOptions};
use crate::error::EngineError;
use crate::keys::encode_for_engine;

const DEFAULT_BINARY: &str = "nvim";
const SOCKET_NAME: &str = "nvim.sock";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Settings applied when [`LaunchOptions::quiet`] is set.
const QUIET_SETTINGS: &str = "set shortmess+=IacF belloff=all noerrorbells report=9999 nomore";

/// Configuration for launching Neovim instances.
#[derive(Debug, Clone)]
pub struct NeovimConfig {
    /// Path or name of the `nvim` executable.
    pub binary: PathBuf,
    /// How long to wait for a fresh instance to answer on its socket.
    pub startup_timeout: Duration,
    /// Upper bound for a single request round-trip.
    pub query_timeout: Duration,
}

impl NeovimConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

impl Default for NeovimConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            startup_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Starts a fresh headless Neovim per launch.
#[derive(Debug, Clone, Default)]
pub struct NeovimLauncher {
    config: NeovimConfig,
}

impl NeovimLauncher {
    pub fn new(config: NeovimConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NeovimConfig {
        &self.config
    }
}

#[async_trait]
impl EngineLauncher for NeovimLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn EditorEngine>, EngineError> {
        let engine = NeovimEngine::start(self.config.clone(), options).await?;
        Ok(Box::new(engine))
    }
}

/// A running headless Neovim instance.
///
/// The process is killed and the sandbox directory removed on
/// [`EditorEngine::terminate`] or, failing that, on drop.
pub struct NeovimEngine {
    config: NeovimConfig,
    socket: PathBuf,
    child: Option<Child>,
    sandbox: Option<TempDir>,
}

impl NeovimEngine {
    /// Spawns `nvim`, waits for its socket, and seeds the buffer.
    pub async fn start(config: NeovimConfig, options: &LaunchOptions) -> Result<Self, EngineError> {
        let sandbox = tempfile::Builder::new()
            .prefix("vimgolf-nvim-")
            .tempdir()
            .map_err(|e| EngineError::Start(format!("Failed to create sandbox directory: {}", e)))?;
        let socket = sandbox.path().join(SOCKET_NAME);

        let mut command = Command::new(&config.binary);
        command
            .args(["--headless", "--clean", "-n", "-i", "NONE", "--listen"])
            .arg(&socket)
            .current_dir(sandbox.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        isolate_env(&mut command, sandbox.path());

        let child = command.spawn().map_err(|e| {
            EngineError::Start(format!("Failed to spawn {}: {}", config.binary.display(), e))
        })?;

        let mut engine = Self {
            config,
            socket,
            child: Some(child),
            sandbox: Some(sandbox),
        };

        engine.wait_until_ready().await?;
        engine.prepare(options).await?;

        debug!(socket = %engine.socket.display(), "Neovim instance ready");
        Ok(engine)
    }

    /// Path of the instance's RPC socket.
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    async fn wait_until_ready(&mut self) -> Result<(), EngineError> {
        let started = Instant::now();

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(EngineError::Start(format!(
                        "nvim exited during startup with {}",
                        status
                    )));
                }
            }

            if self.socket.exists() && self.request("json_encode(1)").await.is_ok() {
                return Ok(());
            }

            if started.elapsed() >= self.config.startup_timeout {
                warn!(
                    socket = %self.socket.display(),
                    "Neovim did not answer within {:?}", self.config.startup_timeout
                );
                return Err(EngineError::StartupTimeout(self.config.startup_timeout));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn prepare(&mut self, options: &LaunchOptions) -> Result<(), EngineError> {
        let lines = serde_json::to_string(&options.seed_lines())?;
        let expr = seed_expression(&lines, options.quiet);
        self.request(&expr)
            .await
            .map_err(|e| EngineError::Start(format!("Failed to seed buffer: {}", e)))?;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.child.is_none() {
            return Err(EngineError::InactiveSession);
        }
        Ok(())
    }

    /// Evaluates `expr` on the server and returns its (string) result.
    async fn request(&self, expr: &str) -> Result<String, EngineError> {
        let mut command = Command::new(&self.config.binary);
        command
            .args(["--headless", "--clean", "--server"])
            .arg(&self.socket)
            .arg("--remote-expr")
            .arg(expr)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(sandbox) = &self.sandbox {
            isolate_env(&mut command, sandbox.path());
        }

        let output = tokio::time::timeout(self.config.query_timeout, command.output())
            .await
            .map_err(|_| EngineError::RequestTimeout(self.config.query_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Query(format!(
                "remote request exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl EditorEngine for NeovimEngine {
    async fn feed_keys(&mut self, keys: &str) -> Result<(), EngineError> {
        self.ensure_running()?;
        let expr = feed_expression(&encode_for_engine(keys));
        match self.request(&expr).await {
            Ok(_) => Ok(()),
            Err(EngineError::Query(message)) => Err(EngineError::Injection(message)),
            Err(EngineError::Io(e)) => Err(EngineError::Injection(e.to_string())),
            Err(other) => Err(other),
        }
    }

    async fn snapshot(&mut self) -> Result<EngineSnapshot, EngineError> {
        self.ensure_running()?;
        let raw = self.request(SNAPSHOT_EXPRESSION).await?;
        parse_snapshot(&raw)
    }

    async fn terminate(&mut self) -> Result<(), EngineError> {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "nvim already exited");
            }
            if tokio::time::timeout(self.config.query_timeout, child.wait())
                .await
                .is_err()
            {
                warn!(socket = %self.socket.display(), "nvim did not exit after kill");
            }
        }

        if let Some(sandbox) = self.sandbox.take() {
            let path = sandbox.path().to_path_buf();
            if let Err(e) = sandbox.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove sandbox directory");
            } else {
                info!(path = %path.display(), "Neovim sandbox removed");
            }
        }

        Ok(())
    }
}

impl Drop for NeovimEngine {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!(
                socket = %self.socket.display(),
                "Neovim engine dropped without terminate, killing process"
            );
        }
    }
}

/// Points every per-user directory into the sandbox and drops inherited
/// parent-instance variables.
fn isolate_env(command: &mut Command, sandbox: &Path) {
    command
        .env("XDG_CONFIG_HOME", sandbox.join("config"))
        .env("XDG_DATA_HOME", sandbox.join("data"))
        .env("XDG_STATE_HOME", sandbox.join("state"))
        .env("XDG_CACHE_HOME", sandbox.join("cache"))
        .env("XDG_RUNTIME_DIR", sandbox)
        .env_remove("NVIM")
        .env_remove("NVIM_LISTEN_ADDRESS")
        .env_remove("VIMINIT");
}

const SNAPSHOT_EXPRESSION: &str = "json_encode({'mode': nvim_get_mode().mode, \
     'cursor': nvim_win_get_cursor(0), \
     'lines': nvim_buf_get_lines(0, 0, -1, v:false)})";

#[derive(Deserialize)]
struct RawSnapshot {
    mode: String,
    cursor: (usize, usize),
    lines: Vec<String>,
}

fn parse_snapshot(raw: &str) -> Result<EngineSnapshot, EngineError> {
    let RawSnapshot {
        mode,
        cursor: (row, col),
        lines,
    } = serde_json::from_str(raw)?;
    Ok(EngineSnapshot {
        mode,
        cursor: Cursor::new(row, col),
        lines,
    })
}

/// Quotes `text` as a Vim single-quoted string literal.
fn vim_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn feed_expression(encoded_keys: &str) -> String {
    format!(
        "json_encode(nvim_feedkeys(nvim_replace_termcodes({}, v:true, v:false, v:true), 'n', v:false))",
        vim_string(encoded_keys)
    )
}

fn seed_expression(lines_json: &str, quiet: bool) -> String {
    let mut commands = Vec::new();
    if quiet {
        commands.push(vim_string(QUIET_SETTINGS));
    }
    commands.push(vim_string("normal! gg"));
    commands.push(vim_string("set nomodified"));

    format!(
        "json_encode([nvim_buf_set_lines(0, 0, -1, v:false, json_decode({})), execute([{}])])",
        vim_string(lines_json),
        commands.join(", ")
    )
}
