//! Camera capture.

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uplink_common::models::ShootingMode;

use crate::error::Result;

/// How long a capture command gets to exit after SIGTERM.
const STOP_GRACE: Duration = Duration::from_secs(2);

#[async_trait]
pub trait CaptureDriver: Send + Sync {
    fn shooting_mode(&self) -> ShootingMode;

    /// Start producing frames at the mode's dimensions and `target_fps`.
    async fn start_capture(&self, target_fps: u32) -> Result<()>;

    async fn stop_capture(&self);
}

/// Capture backed by an external command that feeds RTP to local ports.
///
/// The command is a shell template; `{width}`, `{height}`, `{fps}`,
/// `{mode}`, `{video_port}` and `{audio_port}` are substituted before it is
/// run with `sh -c`. Without a command, capture is a no-op.
///
/// The shell leads its own process group and stopping signals the whole
/// group, so pipelines and background jobs in the template end with it.
pub struct ProcessCapture {
    command: Option<String>,
    shooting_mode: ShootingMode,
    video_port: u16,
    audio_port: u16,
    running: Mutex<Option<Running>>,
}

struct Running {
    child: Child,
    /// The shell's pid, which is also its process group id.
    group: Option<u32>,
}

impl ProcessCapture {
    pub fn new(command: Option<String>, shooting_mode: ShootingMode, video_port: u16, audio_port: u16) -> Self {
        Self {
            command,
            shooting_mode,
            video_port,
            audio_port,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    fn render(&self, template: &str, fps: u32) -> String {
        let mode = self.shooting_mode;
        template
            .replace("{width}", &mode.width().to_string())
            .replace("{height}", &mode.height().to_string())
            .replace("{fps}", &fps.to_string())
            .replace("{mode}", mode.value())
            .replace("{video_port}", &self.video_port.to_string())
            .replace("{audio_port}", &self.audio_port.to_string())
    }
}

#[async_trait]
impl CaptureDriver for ProcessCapture {
    fn shooting_mode(&self) -> ShootingMode {
        self.shooting_mode
    }

    async fn start_capture(&self, target_fps: u32) -> Result<()> {
        let Some(template) = &self.command else {
            info!(mode = self.shooting_mode.value(), "no capture command configured");
            return Ok(());
        };
        let command = self.render(template, target_fps);
        info!(%command, "starting capture");
        let mut builder = Command::new("sh");
        builder.arg("-c").arg(&command).stdin(Stdio::null()).kill_on_drop(true);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            builder.as_std_mut().process_group(0);
        }
        let child = builder.spawn()?;
        let running = Running {
            group: child.id(),
            child,
        };
        if let Ok(mut slot) = self.running.lock() {
            if let Some(previous) = slot.replace(running) {
                warn!("capture restarted while running");
                signal_group(previous.group, GroupSignal::Kill);
            }
        }
        Ok(())
    }

    async fn stop_capture(&self) {
        let running = self.running.lock().ok().and_then(|mut slot| slot.take());
        let Some(Running { mut child, group }) = running else {
            debug!("capture not running");
            return;
        };
        signal_group(group, GroupSignal::Terminate);
        match timeout(STOP_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "capture stopped"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for capture process"),
            Err(_) => {
                warn!("capture ignored SIGTERM, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to stop capture process");
                }
            }
        }
        // The shell can exit before group members that ignore SIGTERM.
        signal_group(group, GroupSignal::Kill);
    }
}

impl Drop for ProcessCapture {
    fn drop(&mut self) {
        if let Ok(Some(running)) = self.running.get_mut() {
            signal_group(running.group, GroupSignal::Kill);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(group: Option<u32>, signal: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(group) = group else {
        return;
    };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(group as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(error = %e, ?signal, "failed to signal capture process group"),
    }
}

// Without process groups only the shell itself is stopped.
#[cfg(not(unix))]
fn signal_group(_group: Option<u32>, _signal: GroupSignal) {}
