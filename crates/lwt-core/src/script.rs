//! Branch-name generator hook.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ScriptError;

/// Wall-clock limit for the branch-name script.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// What the generated branch is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Pr,
    Issue,
}

impl ScriptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptKind::Pr => "pr",
            ScriptKind::Issue => "issue",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub script: String,
    pub kind: ScriptKind,
    pub number: u64,
    pub suggested: String,
    /// Piped to the script's stdin (title and body).
    pub content: String,
}

/// Runs the script and returns the first non-empty line it prints.
///
/// # Errors
/// Returns `ScriptError::Timeout` when the script exceeds `timeout`, and
/// `ScriptError::Failed` when it exits non-zero or prints nothing.
pub async fn run_branch_name_script(
    request: &ScriptRequest,
    timeout: Duration,
) -> Result<String, ScriptError> {
    let mut child = Command::new("bash")
        .arg("-c")
        .arg(&request.script)
        .env("LWT_TYPE", request.kind.as_str())
        .env("LWT_NUMBER", request.number.to_string())
        .env("LWT_SUGGESTED_NAME", &request.suggested)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ScriptError::Failed(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        // A script that ignores stdin may close it early; that is not an error.
        let _ = stdin.write_all(request.content.as_bytes()).await;
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| ScriptError::Failed(e.to_string()))?,
        Err(_) => return Err(ScriptError::Timeout(timeout)),
    };

    if !output.status.success() {
        return Err(ScriptError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScriptError::Failed("no output".to_string()))
}

/// Resolves the branch name for a PR or issue, falling back to the
/// suggestion on any script failure.
pub async fn branch_name_or_default(script: Option<&str>, mut request: ScriptRequest) -> String {
    let Some(script) = script.filter(|s| !s.trim().is_empty()) else {
        return request.suggested;
    };
    request.script = script.to_string();
    match run_branch_name_script(&request, SCRIPT_TIMEOUT).await {
        Ok(name) => {
            let cleaned = crate::models::sanitize_branch_name(&name, 100);
            if cleaned.is_empty() {
                request.suggested
            } else {
                cleaned
            }
        }
        Err(err) => {
            tracing::warn!("{err}");
            request.suggested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(script: &str) -> ScriptRequest {
        ScriptRequest {
            script: script.to_string(),
            kind: ScriptKind::Issue,
            number: 12,
            suggested: "issue-12-fallback".to_string(),
            content: "Crash on start\n\nbody".to_string(),
        }
    }

    #[tokio::test]
    async fn test_script_reads_env_and_stdin() {
        let req = request("head -n1 | tr ' ' '-' | sed \"s/^/$LWT_TYPE-$LWT_NUMBER-/\"");
        let name = run_branch_name_script(&req, SCRIPT_TIMEOUT).await.unwrap();
        assert_eq!(name, "issue-12-Crash-on-start");
    }

    #[tokio::test]
    async fn test_script_timeout() {
        let req = request("sleep 5");
        let err = run_branch_name_script(&req, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_failed_script_falls_back() {
        let req = request("exit 1");
        let name = branch_name_or_default(Some("exit 1"), req).await;
        assert_eq!(name, "issue-12-fallback");
    }

    #[tokio::test]
    async fn test_no_script_uses_suggestion() {
        let name = branch_name_or_default(None, request("")).await;
        assert_eq!(name, "issue-12-fallback");
    }
}
