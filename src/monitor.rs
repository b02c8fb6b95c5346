use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;

use crate::panel::PanelGuard;
use crate::render::Renderer;
use crate::screen::{compose, ScreenSelector};
use crate::status::{LinkStatus, LogSource};
use crate::telemetry::TelemetryProvider;

pub struct Monitor<T: TelemetryProvider> {
    title: String,
    telemetry: T,
    log: LogSource,
    renderer: Renderer,
    guard: PanelGuard,
    screen: ScreenSelector,
    last_status: Option<LinkStatus>,
}

impl<T: TelemetryProvider> Monitor<T> {
    pub fn new(title: String, telemetry: T, log: LogSource, renderer: Renderer, guard: PanelGuard) -> Self {
        Monitor {
            title,
            telemetry,
            log,
            renderer,
            guard,
            screen: ScreenSelector::System,
            last_status: None,
        }
    }

    #[cfg(test)]
    pub fn screen(&self) -> ScreenSelector {
        self.screen
    }

    /// One sample-extract-compose-render pass, then flips the screen.
    /// Returns the screen that was shown. A failed push is logged and the
    /// next tick tries again.
    pub fn tick(&mut self) -> ScreenSelector {
        let telemetry = self.telemetry.sample();
        let status = self.log.extract();
        self.log_transitions(&status);

        let shown = self.screen;
        let frame = compose(&self.title, &telemetry, &status, shown);
        debug!(
            "{:?}: ip={} cpu={:.1}% temp={} conf={} speaker={} tx={}",
            shown,
            telemetry.ip,
            telemetry.cpu_percent,
            telemetry.cpu_temp,
            status.conference,
            status.speaker,
            status.transmitting()
        );

        if let Err(e) = self.renderer.render_to(&frame, self.guard.panel()) {
            warn!("Display update failed: {:#}", e);
        }

        self.screen = shown.toggled();
        shown
    }

    fn log_transitions(&mut self, status: &LinkStatus) {
        if let Some(prev) = &self.last_status {
            if prev.radio != status.radio {
                info!("Transmitter {}", if status.transmitting() { "ON" } else { "OFF" });
            }
            if prev.conference != status.conference {
                info!("Conference: {}", status.conference);
            }
        }
        self.last_status = Some(status.clone());
    }

    /// Blanks the panel. Also happens on drop if never called.
    pub fn shutdown(mut self) {
        if let Err(e) = self.guard.release() {
            warn!("Failed to blank display on exit: {:#}", e);
        }
        info!("Display cleared, exiting");
    }
}

/// Ticks every `interval` until `stop` resolves. The stop signal is also
/// honored while sleeping, so shutdown waits for at most one tick.
pub async fn run<T, F>(monitor: &mut Monitor<T>, interval: Duration, stop: F)
where
    T: TelemetryProvider,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    loop {
        monitor.tick();
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut stop => break,
        }
    }
}
