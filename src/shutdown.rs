use log::info;
use std::io;
use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGINT and SIGTERM listeners.
///
/// Both are installed by [`ShutdownSignal::register`], not on first poll, so a
/// signal that arrives while the panel is being opened or a tick is running
/// is held until [`ShutdownSignal::recv`] looks at it instead of killing the
/// process with the panel still lit.
pub struct ShutdownSignal {
    interrupt: Signal,
    terminate: Signal,
}

impl ShutdownSignal {
    /// Must be called from inside a tokio runtime context.
    pub fn register() -> io::Result<Self> {
        Ok(ShutdownSignal {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Interrupted"),
            _ = self.terminate.recv() => info!("Terminated"),
        }
    }
}
