//! Liveness probe for converter candidates

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Result of running `<candidate> -version`
#[derive(Debug)]
pub enum ProbeOutcome {
    Healthy,
    Missing,
    SpawnFailed(std::io::Error),
    TimedOut(Duration),
    Failed(Option<i32>),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Healthy => write!(f, "healthy"),
            ProbeOutcome::Missing => write!(f, "no such file"),
            ProbeOutcome::SpawnFailed(e) => write!(f, "could not run: {e}"),
            ProbeOutcome::TimedOut(after) => write!(f, "no exit after {}ms", after.as_millis()),
            ProbeOutcome::Failed(Some(code)) => write!(f, "exited with code {code}"),
            ProbeOutcome::Failed(None) => write!(f, "terminated by signal"),
        }
    }
}

/// Run `<path> -version` with output discarded and report how it went.
///
/// Every failure mode maps to an outcome instead of an error so the caller
/// can log it and move on to the next candidate.
pub async fn probe(path: &Path, timeout: Duration) -> ProbeOutcome {
    if !path.is_file() {
        return ProbeOutcome::Missing;
    }

    let mut cmd = Command::new(path);
    cmd.arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ProbeOutcome::SpawnFailed(e),
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) if status.success() => ProbeOutcome::Healthy,
        Ok(Ok(status)) => ProbeOutcome::Failed(status.code()),
        Ok(Err(e)) => ProbeOutcome::SpawnFailed(e),
        Err(_) => {
            let _ = child.kill().await;
            ProbeOutcome::TimedOut(timeout)
        }
    }
}
