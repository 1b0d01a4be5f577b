//! Service manager notifications through `$NOTIFY_SOCKET`.
//!
//! All functions are no-ops when the process is not supervised.

#[derive(Debug)]
pub struct ProcessState {
    pub span: tracing::Span,
}

impl ProcessState {
    pub fn set_starting(&self) {
        self.notify_logged("starting", &[NotifyState::Status("starting")]);
    }

    pub fn set_running(&self, plugins: usize) {
        let status = format!("running {plugins} plugins");
        self.notify_logged("ready", &[NotifyState::Ready, NotifyState::Status(&status)]);
    }

    pub fn ping_watchdog(&self) {
        if let Err(error) = notify(&[NotifyState::Watchdog]) {
            tracing::warn!(parent: &self.span, ?error, "Failed to ping watchdog");
        }
    }

    pub fn set_finished(&self) {
        self.notify_logged("stopping", &[NotifyState::Stopping]);
    }

    fn notify_logged(&self, status: &str, state: &[NotifyState<'_>]) {
        tracing::debug!(parent: &self.span, status, "Setting service status");
        if let Err(error) = notify(state) {
            tracing::error!(parent: &self.span, ?error, "Failed to notify systemd of state change");
        } else {
            tracing::info!(
                parent: &self.span,
                status,
                "Successfully notified systemd of service status"
            );
        }
    }
}

/// Daemon notification for the service manager.
#[derive(Clone, Debug)]
enum NotifyState<'a> {
    /// Service startup is finished.
    Ready,

    /// Service is stopping.
    Stopping,

    /// Free-form status message for the service manager.
    Status(&'a str),

    /// Tells the service manager to update the watchdog timestamp.
    Watchdog,
}

impl std::fmt::Display for NotifyState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyState::Ready => write!(f, "READY=1"),
            NotifyState::Stopping => write!(f, "STOPPING=1"),
            NotifyState::Status(msg) => write!(f, "STATUS={msg}"),
            NotifyState::Watchdog => write!(f, "WATCHDOG=1"),
        }
    }
}

fn connect_notify_socket() -> std::io::Result<Option<std::os::unix::net::UnixDatagram>> {
    let Some(socket_path) = std::env::var_os("NOTIFY_SOCKET") else {
        return Ok(None);
    };

    let sock = std::os::unix::net::UnixDatagram::unbound()?;

    sock.connect(socket_path)?;

    Ok(Some(sock))
}

fn render(state: &[NotifyState<'_>]) -> String {
    use std::fmt::Write;

    let mut msg = String::new();
    for s in state {
        let _ = writeln!(msg, "{s}");
    }
    msg
}

fn notify(state: &[NotifyState<'_>]) -> std::io::Result<()> {
    let Some(sock) = connect_notify_socket()? else {
        return Ok(());
    };

    let msg = render(state);
    let len = sock.send(msg.as_bytes())?;

    if len != msg.len() {
        Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "incomplete write",
        ))
    } else {
        Ok(())
    }
}
