//! Helper subprocess management.
//!
//! The helper is spawned with its stdin and stdout piped and its stderr
//! inherited, so helper diagnostics land on the importer's own stderr. The
//! repository path goes last on the command line, after any configured
//! arguments.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use porter_core::config::HelperConfig;

use crate::channel::HelperChannel;
use crate::error::ImportError;

/// Owns the helper process for the lifetime of its channel. Dropping the
/// guard kills and reaps the child.
pub struct HelperGuard {
    child: Child,
}

impl HelperGuard {
    pub(crate) fn new(child: Child) -> Self {
        Self { child }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for HelperGuard {
    fn drop(&mut self) {
        // Kill may fail if the helper already exited; the wait below reaps
        // it either way.
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => tracing::debug!(%status, "helper process reaped"),
            Err(e) => tracing::debug!(error = %e, "failed to reap helper process"),
        }
    }
}

/// Spawn the configured helper for `repo` and wrap its pipes in a channel.
///
/// The returned channel has not yet been negotiated; callers must read the
/// startup chunk before sending requests.
pub fn spawn_helper(config: &HelperConfig, repo: &Path) -> Result<HelperChannel, ImportError> {
    let mut child = Command::new(&config.command)
        .args(&config.args)
        .arg(repo)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(ImportError::Spawn)?;

    let stdin = child.stdin.take().ok_or_else(|| {
        ImportError::Spawn(std::io::Error::new(
            std::io::ErrorKind::Other,
            "helper stdin was not captured",
        ))
    })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        ImportError::Spawn(std::io::Error::new(
            std::io::ErrorKind::Other,
            "helper stdout was not captured",
        ))
    })?;

    tracing::debug!(
        pid = child.id(),
        command = %config.command.display(),
        repo = %repo.display(),
        "helper spawned"
    );

    let mut channel = HelperChannel::from_parts(stdout, stdin);
    channel.attach_guard(HelperGuard::new(child));
    Ok(channel)
}
