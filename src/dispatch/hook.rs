//! Dispatch through an operator-configured executable.
//!
//! The hook is invoked as `<program> [args..] <target> <value> <payload-hex>`.
//! Exit status 0 means the call succeeded. The child is killed if the
//! dispatch future is dropped, which is how the ledger's timeout stops a
//! stalled hook.

use super::traits::*;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};

/// Maximum stderr bytes carried into a rejection message.
const MAX_STDERR_BYTES: usize = 512;

/// Keep the first `MAX_STDERR_BYTES` of the hook's stderr and discard the
/// rest, so the child never blocks on a full pipe.
async fn read_capped(stderr: Option<ChildStderr>) -> std::io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    if let Some(mut stderr) = stderr {
        (&mut stderr)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut captured)
            .await?;
        tokio::io::copy(&mut stderr, &mut tokio::io::sink()).await?;
    }
    Ok(captured)
}

/// Runs an external program for every call.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    program: PathBuf,
    args: Vec<String>,
}

impl HookDispatcher {
    /// Create a hook dispatcher for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Fixed arguments placed before the call arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program this dispatcher runs.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl Dispatcher for HookDispatcher {
    async fn invoke(&self, call: &Call) -> DispatchResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(call.target.to_string())
            .arg(call.value.to_string())
            .arg(hex::encode(&call.payload))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let unavailable = |e: std::io::Error| {
            DispatchError::Unavailable(format!(
                "failed to run hook '{}': {}",
                self.program.display(),
                e
            ))
        };

        let mut child = cmd.spawn().map_err(unavailable)?;
        let stderr = child.stderr.take();
        let (status, stderr) = tokio::join!(child.wait(), read_capped(stderr));
        let status = status.map_err(unavailable)?;

        if status.success() {
            return Ok(());
        }

        // A failed stderr read only loses the diagnostic.
        let stderr = stderr.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();

        let reason = match (status.code(), stderr.is_empty()) {
            (Some(code), true) => format!("hook exited with status {}", code),
            (Some(code), false) => format!("hook exited with status {}: {}", code, stderr),
            (None, _) => "hook terminated by signal".to_string(),
        };
        Err(DispatchError::Rejected(reason))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Principal;

    fn call() -> Call {
        Call {
            target: Principal::repeat(3),
            value: 10,
            payload: vec![0x01, 0x23],
        }
    }

    fn shell(script: &str) -> HookDispatcher {
        HookDispatcher::new("/bin/sh").with_args(["-c", script, "hook"])
    }

    #[tokio::test]
    async fn test_hook_success() {
        assert!(shell("exit 0").invoke(&call()).await.is_ok());
    }

    #[tokio::test]
    async fn test_hook_receives_call_arguments() {
        let expected = format!("{} 10 0123", Principal::repeat(3));
        let script = format!("[ \"$1 $2 $3\" = \"{}\" ]", expected);
        assert!(shell(&script).invoke(&call()).await.is_ok());
    }

    #[tokio::test]
    async fn test_hook_nonzero_exit_is_rejected() {
        let result = shell("echo boom >&2; exit 3").invoke(&call()).await;
        match result {
            Err(DispatchError::Rejected(reason)) => {
                assert!(reason.contains("status 3"));
                assert!(reason.contains("boom"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_noisy_hook_stderr_is_capped() {
        let script = "yes noise | head -c 1000000 >&2; exit 4";
        match shell(script).invoke(&call()).await {
            Err(DispatchError::Rejected(reason)) => {
                assert!(reason.contains("status 4"));
                assert!(reason.contains("noise"));
                assert!(reason.len() <= MAX_STDERR_BYTES + 64);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let dispatcher = HookDispatcher::new("/nonexistent/quorum-hook");
        let result = dispatcher.invoke(&call()).await;
        assert!(matches!(result, Err(DispatchError::Unavailable(_))));
    }
}
