/// Document session state and the file-based edit collaborator.
///
/// Office edits operate on the file on disk, so they are only allowed once
/// the application has saved and closed it. [`ClosedDocument`] can only be
/// obtained from a session in the closed state.
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::errors::{MacAgentError, MacAgentResult};

const EDITOR_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Default)]
enum DocState {
    #[default]
    NoDocument,
    Open(PathBuf),
    Closed(PathBuf),
}

#[derive(Debug, Default)]
pub struct DocumentSession {
    state: DocState,
}

/// Proof that the document at `path` is saved and no longer held by the app.
#[derive(Debug)]
pub struct ClosedDocument {
    path: PathBuf,
}

impl ClosedDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSession {
    pub fn opened(&mut self, path: PathBuf) {
        tracing::debug!(path = %path.display(), "document open");
        self.state = DocState::Open(path);
    }

    /// Working path of the current document, open or closed.
    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            DocState::NoDocument => None,
            DocState::Open(p) | DocState::Closed(p) => Some(p),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DocState::Open(_))
    }

    /// Record that the app saved and closed the document. The working path
    /// becomes `path` (the requested output) when the app had no document.
    pub fn mark_closed(&mut self, path: &Path) {
        let working = match std::mem::take(&mut self.state) {
            DocState::Open(p) | DocState::Closed(p) => p,
            DocState::NoDocument => path.to_path_buf(),
        };
        tracing::debug!(path = %working.display(), "document closed");
        self.state = DocState::Closed(working);
    }

    pub fn closed(&self) -> MacAgentResult<ClosedDocument> {
        match &self.state {
            DocState::Closed(p) => Ok(ClosedDocument { path: p.clone() }),
            DocState::Open(p) => Err(MacAgentError::Precondition(format!(
                "{} is still open in the application; call save_and_close first",
                p.display()
            ))),
            DocState::NoDocument => Err(MacAgentError::Precondition(
                "no document has been opened and closed in this session".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct EditRequest<'a> {
    input_path: &'a Path,
    output_path: &'a Path,
    operation: &'a str,
    params: &'a serde_json::Value,
}

/// Disk-file document transformation: `(input, output, edit) -> outcome`.
#[async_trait]
pub trait DocumentEditor: Send + Sync {
    async fn apply(
        &self,
        document: &ClosedDocument,
        output: &Path,
        operation: &str,
        params: &serde_json::Value,
    ) -> MacAgentResult<EditOutcome>;
}

/// Pipes one JSON request to an external program and reads its JSON reply.
pub struct ExternalEditor {
    command: String,
    args: Vec<String>,
}

impl ExternalEditor {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }
}

#[async_trait]
impl DocumentEditor for ExternalEditor {
    async fn apply(
        &self,
        document: &ClosedDocument,
        output: &Path,
        operation: &str,
        params: &serde_json::Value,
    ) -> MacAgentResult<EditOutcome> {
        let request = serde_json::to_vec(&EditRequest {
            input_path: document.path(),
            output_path: output,
            operation,
            params,
        })?;

        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).await?;
        }

        let output = tokio::time::timeout(EDITOR_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| MacAgentError::Timeout(format!("document editor '{}'", self.command)))??;

        if !output.status.success() {
            return Ok(EditOutcome {
                success: false,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let outcome: EditOutcome = serde_json::from_slice(&output.stdout)?;
        tracing::info!(operation, success = outcome.success, "document edit applied");
        Ok(outcome)
    }
}

/// Used when no editor command is configured.
pub struct NoEditor;

#[async_trait]
impl DocumentEditor for NoEditor {
    async fn apply(
        &self,
        _document: &ClosedDocument,
        _output: &Path,
        operation: &str,
        _params: &serde_json::Value,
    ) -> MacAgentResult<EditOutcome> {
        Ok(EditOutcome {
            success: false,
            message: format!("no document editor configured for '{operation}'"),
        })
    }
}
