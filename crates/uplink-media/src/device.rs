//! Camera device hand-off around a streaming session.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Releases the camera to the streaming pipeline and takes it back.
///
/// Both calls are fire-and-forget; failures are logged by the implementation.
pub trait DeviceControl: Send + Sync {
    fn close_for_streaming(&self);

    fn reopen_after_streaming(&self);
}

/// Runs optional shell commands for each transition.
#[derive(Debug, Clone, Default)]
pub struct CommandHooks {
    close_command: Option<String>,
    open_command: Option<String>,
}

impl CommandHooks {
    pub fn new(close_command: Option<String>, open_command: Option<String>) -> Self {
        Self {
            close_command,
            open_command,
        }
    }

    fn spawn(&self, hook: &'static str, command: Option<&str>) {
        let Some(command) = command else {
            debug!(hook, "no device command configured");
            return;
        };
        // The command is running once this returns, even if the runtime
        // stops before the status task is polled.
        let child = Command::new("sh").arg("-c").arg(command).stdin(Stdio::null()).spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(hook, %command, error = %e, "device command could not run");
                return;
            }
        };
        let command = command.to_owned();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => info!(hook, %command, "device command finished"),
                Ok(status) => warn!(hook, %command, %status, "device command failed"),
                Err(e) => warn!(hook, %command, error = %e, "device command could not be awaited"),
            }
        });
    }
}

impl DeviceControl for CommandHooks {
    fn close_for_streaming(&self) {
        self.spawn("close", self.close_command.as_deref());
    }

    fn reopen_after_streaming(&self) {
        self.spawn("open", self.open_command.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;

    async fn wait_for(path: &PathBuf) -> bool {
        for _ in 0..100 {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn runs_the_configured_command_for_each_transition() {
        let dir = std::env::temp_dir().join(format!("uplink-hooks-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let closed = dir.join("closed");
        let opened = dir.join("opened");

        let hooks = CommandHooks::new(
            Some(format!("touch {}", closed.display())),
            Some(format!("touch {}", opened.display())),
        );

        hooks.close_for_streaming();
        assert!(wait_for(&closed).await);
        assert!(!opened.exists());

        hooks.reopen_after_streaming();
        assert!(wait_for(&opened).await);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopen_runs_even_if_the_runtime_stops_right_after() {
        let dir = std::env::temp_dir().join(format!("uplink-hooks-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let opened = dir.join("opened");
        let hooks = CommandHooks::new(None, Some(format!("touch {}", opened.display())));

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async { hooks.reopen_after_streaming() });
        drop(runtime);

        let mut found = false;
        for _ in 0..100 {
            if opened.exists() {
                found = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(found);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_commands_are_skipped() {
        let hooks = CommandHooks::default();
        hooks.close_for_streaming();
        hooks.reopen_after_streaming();
    }
}
