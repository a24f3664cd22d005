use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::MacAgentResult;
use crate::llm::types::ToolCall;
use crate::perception::types::ElementRecord;

/// One completed step as replayed into later prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// The structured action call the model produced, if any.
    pub tool_call: Option<ToolCall>,
    pub observations: Vec<String>,
}

/// Which history items are replayed into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    #[default]
    Full,
    KeepLast(usize),
}

impl HistoryPolicy {
    pub fn select<'a>(&self, items: &'a [HistoryItem]) -> &'a [HistoryItem] {
        match self {
            HistoryPolicy::Full => items,
            HistoryPolicy::KeepLast(k) => &items[items.len().saturating_sub(*k)..],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub step: usize,
    #[serde(flatten)]
    pub item: HistoryItem,
}

/// Artifact directory `results/<run-id>/<agent>/<session-id>/` with a JSONL step log.
/// Each agent invocation gets its own session, so repeated calls never share files.
pub struct SessionHistory {
    pub session_id: String,
    dir: Option<PathBuf>,
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    /// Artifacts go under `results_dir/run_id/agent/session_id`. A directory that
    /// cannot be created disables artifacts; the run itself continues.
    pub fn new(results_dir: &Path, run_id: &str, agent: &str) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = results_dir.join(run_id).join(agent).join(&session_id);
        let dir = match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "results directory unavailable, artifacts disabled");
                None
            }
        };
        Self {
            session_id,
            dir,
            entries: Vec::new(),
        }
    }

    /// In-memory only, nothing written.
    pub fn detached() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            dir: None,
            entries: Vec::new(),
        }
    }

    pub fn items(&self) -> Vec<HistoryItem> {
        self.entries.iter().map(|e| e.item.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, step: usize, item: HistoryItem) {
        self.entries.push(HistoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            step,
            item,
        });
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "history flush failed");
        }
    }

    /// Append the latest entry to `history.jsonl`.
    fn flush(&self) -> MacAgentResult<()> {
        let (Some(dir), Some(last)) = (&self.dir, self.entries.last()) else {
            return Ok(());
        };
        let path = dir.join("history.jsonl");
        let line = serde_json::to_string(last)?;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %path.display(), "history entry flushed");
        Ok(())
    }

    /// Save the step's screenshots and element list. Failures are logged only.
    pub fn save_step(
        &self,
        step: usize,
        screenshot: Option<&image::RgbaImage>,
        annotated: Option<&image::RgbaImage>,
        elements: &[ElementRecord],
    ) {
        let Some(dir) = &self.dir else {
            return;
        };
        let result: MacAgentResult<()> = (|| {
            if let Some(img) = screenshot {
                img.save(dir.join(format!("step_{step}.png")))?;
            }
            if let Some(img) = annotated {
                img.save(dir.join(format!("step_{step}_som.png")))?;
            }
            let json = serde_json::to_string_pretty(elements)?;
            std::fs::write(dir.join(format!("step_{step}_elements.json")), json)?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!(step, error = %e, "step artifacts not saved");
        }
    }
}
