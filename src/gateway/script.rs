//! Message scripting hook.
//!
//! A configured script may rewrite the text and username of every message
//! before it is relayed. The script runs as a child process: it receives a
//! JSON object on stdin and prints a JSON object on stdout.
//!
//! ```text
//! stdin:  {"msgText": "...", "msgUsername": "...", "msgAccount": "...", "msgChannel": "..."}
//! stdout: {"msgText": "...", "msgUsername": "..."}
//! ```

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::common::error::ScriptError;

/// Values handed to the script.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptInput {
    #[serde(rename = "msgText")]
    pub text: String,
    #[serde(rename = "msgUsername")]
    pub username: String,
    #[serde(rename = "msgAccount")]
    pub account: String,
    #[serde(rename = "msgChannel")]
    pub channel: String,
}

/// Values read back from the script. Missing fields leave the message as is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptOutput {
    #[serde(rename = "msgText", default)]
    pub text: Option<String>,
    #[serde(rename = "msgUsername", default)]
    pub username: Option<String>,
}

#[async_trait]
pub trait MessageScript: Send + Sync {
    async fn transform(&self, input: ScriptInput) -> Result<ScriptOutput, ScriptError>;
}

/// Script executed as a child process, optionally through an interpreter.
#[derive(Debug, Clone)]
pub struct ProcessScript {
    path: PathBuf,
    interpreter: Option<String>,
}

impl ProcessScript {
    pub fn new(path: impl Into<PathBuf>, interpreter: Option<String>) -> Self {
        Self {
            path: path.into(),
            interpreter,
        }
    }

    fn command(&self) -> Command {
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.path);
                command
            }
            None => Command::new(&self.path),
        };
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl MessageScript for ProcessScript {
    async fn transform(&self, input: ScriptInput) -> Result<ScriptOutput, ScriptError> {
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|source| ScriptError::Load {
                path: self.display_path(),
                source,
            })?;

        let mut child = self.command().spawn().map_err(|source| ScriptError::Load {
            path: self.display_path(),
            source,
        })?;

        let mut payload = serde_json::to_vec(&input).map_err(|source| ScriptError::Output {
            path: self.display_path(),
            source,
        })?;
        payload.push(b'\n');

        // Output is drained while the input is written, and stdin is closed
        // once the payload is out.
        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&payload).await {
                    // A script that ignores its input may exit before reading it.
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        written?;
        let output = output?;
        if !output.status.success() {
            return Err(ScriptError::Run {
                path: self.display_path(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| ScriptError::Output {
            path: self.display_path(),
            source,
        })
    }
}
