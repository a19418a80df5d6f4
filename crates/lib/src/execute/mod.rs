//! Subprocess execution for downstream build tools.
//!
//! Tools run to completion with piped output. Output is forwarded to the
//! log at `debug` and kept byte-for-byte so failures can surface the tool's
//! own diagnostics.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// A single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub env: BTreeMap<String, String>,
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("program not found: {program}")]
  NotFound { program: String },

  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("`{command}` {}\n{}", exit_description(.code), join_streams(.stdout, .stderr))]
  Failed {
    command: String,
    code: Option<i32>,
    stdout: String,
    stderr: String,
  },
}

impl ToolError {
  /// The tool's own output, stdout followed by stderr.
  pub fn diagnostics(&self) -> Option<String> {
    match self {
      ToolError::Failed { stdout, stderr, .. } => Some(join_streams(stdout, stderr)),
      _ => None,
    }
  }
}

fn exit_description(code: &Option<i32>) -> String {
  match *code {
    Some(code) => format!("exited with code {code}"),
    None => "was terminated by a signal".to_string(),
  }
}

fn join_streams(stdout: &str, stderr: &str) -> String {
  match (stdout.is_empty(), stderr.is_empty()) {
    (true, _) => stderr.to_string(),
    (false, true) => stdout.to_string(),
    (false, false) if stdout.ends_with('\n') => format!("{stdout}{stderr}"),
    (false, false) => format!("{stdout}\n{stderr}"),
  }
}

impl ToolInvocation {
  pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      env: BTreeMap::new(),
    }
  }

  /// Run `script` through the platform shell.
  pub fn shell(script: &str, cwd: impl Into<PathBuf>) -> Self {
    let (shell, shell_args) = default_shell();
    let mut invocation = Self::new(shell, cwd);
    invocation.args = shell_args.iter().map(|s| s.to_string()).collect();
    invocation.args.push(script.to_string());
    invocation
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
    self.env.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    self
  }
}

impl fmt::Display for ToolInvocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program.display())?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " {arg:?}")?;
      } else {
        write!(f, " {arg}")?;
      }
    }
    Ok(())
  }
}

/// Run a tool to completion.
///
/// The child inherits the caller's environment with `invocation.env`
/// layered on top. A non-zero exit is reported as [`ToolError::Failed`]
/// carrying both output streams unmodified.
pub async fn run_tool(invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
  info!(command = %invocation, cwd = ?invocation.cwd, "running tool");

  let program = invocation.program.display().to_string();
  let output = Command::new(&invocation.program)
    .args(&invocation.args)
    .current_dir(&invocation.cwd)
    .envs(&invocation.env)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .output()
    .await
    .map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => ToolError::NotFound {
        program: program.clone(),
      },
      _ => ToolError::Spawn {
        program: program.clone(),
        source,
      },
    })?;

  let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
  forward_lines(&program, "stdout", &stdout);
  forward_lines(&program, "stderr", &stderr);

  if !output.status.success() {
    return Err(ToolError::Failed {
      command: invocation.to_string(),
      code: output.status.code(),
      stdout,
      stderr,
    });
  }

  Ok(ToolOutput { stdout, stderr })
}

fn forward_lines(program: &str, stream: &'static str, text: &str) {
  for line in text.lines() {
    debug!(program, stream, "{line}");
  }
}

/// Locate `name` on `PATH`, honoring an explicit override variable first.
pub fn find_program(name: &str, override_var: &str) -> Result<PathBuf, ToolError> {
  if let Ok(path) = std::env::var(override_var)
    && !path.is_empty()
  {
    return Ok(PathBuf::from(path));
  }
  which::which(name).map_err(|_| ToolError::NotFound {
    program: name.to_string(),
  })
}

/// Shell and leading arguments used for recipe-supplied commands.
///
/// `$SHELL` is not consulted; interactive shells may source profile files.
fn default_shell() -> (&'static str, &'static [&'static str]) {
  #[cfg(unix)]
  {
    ("/bin/sh", &["-c"])
  }

  #[cfg(windows)]
  {
    ("powershell.exe", &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"])
  }
}
