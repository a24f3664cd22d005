/// `osascript` and `open` subprocess plumbing.
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{MacAgentError, MacAgentResult};

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs platform scripting commands. Swapped for a recorder in tests.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run an AppleScript source and return its trimmed stdout.
    async fn run(&self, script: &str) -> MacAgentResult<String>;

    /// `open -a <app> [path]`.
    async fn open(&self, app: &str, path: Option<&Path>) -> MacAgentResult<()>;
}

pub struct OsaScript;

#[async_trait]
impl ScriptRunner for OsaScript {
    async fn run(&self, script: &str) -> MacAgentResult<String> {
        let output = tokio::time::timeout(
            SCRIPT_TIMEOUT,
            Command::new("osascript").arg("-e").arg(script).output(),
        )
        .await
        .map_err(|_| MacAgentError::Timeout("AppleScript execution exceeded 30 seconds".into()))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let error = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(error = %error, "AppleScript failed");
            Err(MacAgentError::Executor(format!("AppleScript failed: {error}")))
        }
    }

    async fn open(&self, app: &str, path: Option<&Path>) -> MacAgentResult<()> {
        let mut cmd = Command::new("open");
        cmd.arg("-a").arg(app);
        if let Some(p) = path {
            cmd.arg(p);
        }
        let output = tokio::time::timeout(SCRIPT_TIMEOUT, cmd.output())
            .await
            .map_err(|_| MacAgentError::Timeout(format!("open -a {app}")))??;

        if output.status.success() {
            tracing::info!(app, path = ?path, "application opened");
            Ok(())
        } else {
            Err(MacAgentError::AppLaunch(format!(
                "{app}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Escape a value for interpolation inside an AppleScript string literal.
pub fn quote(input: &str) -> String {
    let escaped: String = input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\n', '\r'], " ")
        .chars()
        .filter(|&c| c >= ' ' || c == '\t')
        .collect();
    format!("\"{escaped}\"")
}

pub fn activate_script(app: &str) -> String {
    format!("tell application {} to activate", quote(app))
}

pub fn pid_script(app: &str) -> String {
    format!(
        "tell application \"System Events\" to get unix id of first process whose name is {}",
        quote(app)
    )
}

pub fn posix_file(path: &Path) -> String {
    format!("POSIX file {}", quote(&path.to_string_lossy()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_and_flattens() {
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote("a\\b"), r#""a\\b""#);
        assert_eq!(quote("line1\nline2\u{7}"), "\"line1 line2\"");
    }

    #[test]
    fn scripts_embed_quoted_names() {
        assert_eq!(activate_script("Microsoft Word"), "tell application \"Microsoft Word\" to activate");
        assert!(pid_script("Calendar").ends_with("whose name is \"Calendar\""));
        assert_eq!(posix_file(Path::new("/tmp/a b.docx")), "POSIX file \"/tmp/a b.docx\"");
    }
}
