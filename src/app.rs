// ABOUTME: Main application orchestrator that drives the stats tick, probe tick, and TUI
// ABOUTME: Owns the engine on a single control loop and drains probe results from a bounded channel

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{Config, Overrides};
use crate::engine::{Engine, EngineView};
use crate::probe::{LatencyProber, ProbeEvent};
use crate::source::StatsSource;
use crate::tui::{TuiApp, UiAction};

fn periodic(period: Duration) -> Interval {
    let mut timer = time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// The engine plus the collaborators that feed it. Everything here runs on
/// the control loop; only probe processes run elsewhere.
pub struct Monitor {
    engine: Engine,
    source: Box<dyn StatsSource>,
    prober: LatencyProber,
    probe_rx: mpsc::Receiver<ProbeEvent>,
}

impl Monitor {
    pub fn new(config: Config, source: Box<dyn StatsSource>) -> Self {
        let (prober, probe_rx) = LatencyProber::channel();
        Self {
            engine: Engine::new(Arc::new(config.validated()), Utc::now()),
            source,
            prober,
            probe_rx,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn on_stats_tick(&mut self) {
        let polled = self.source.poll();
        self.engine.tick_stats(polled, Instant::now(), Utc::now());
    }

    pub fn on_probe_tick(&mut self) {
        let config = Arc::clone(self.engine.config());
        self.engine.record_dispatch();
        self.prober
            .dispatch(&config.monitor.ping_host, config.probe_timeout());
    }

    pub fn on_probe_event(&mut self, event: ProbeEvent) {
        self.engine.apply_probe(&event);
    }

    /// Apply everything already waiting in the probe channel.
    pub fn drain_probe_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.probe_rx.try_recv() {
            self.on_probe_event(event);
            applied += 1;
        }
        applied
    }

    pub fn reconfigure(&mut self, config: Config) {
        self.engine.reconfigure(Arc::new(config.validated()));
    }

    pub fn view(&self) -> EngineView {
        self.engine.view()
    }

    /// Two stats ticks one interval apart with a probe in between, for
    /// printing a single report without the TUI.
    pub async fn sample_once(&mut self) -> EngineView {
        let config = Arc::clone(self.engine.config());

        self.on_stats_tick();
        self.on_probe_tick();
        time::sleep(config.stats_interval()).await;

        let deadline = config.probe_timeout() + Duration::from_secs(1);
        match time::timeout(deadline, self.probe_rx.recv()).await {
            Ok(Some(event)) => self.on_probe_event(event),
            Ok(None) | Err(_) => warn!("no probe result before deadline"),
        }

        self.on_stats_tick();
        self.view()
    }
}

pub struct App {
    config_path: PathBuf,
    overrides: Overrides,
    monitor: Monitor,
    tui: TuiApp,
}

impl App {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        overrides: Overrides,
        source: Box<dyn StatsSource>,
    ) -> Result<Self> {
        let mode = config.ui.mode;
        let monitor = Monitor::new(config, source);
        let tui = TuiApp::new(mode)?;

        Ok(Self {
            config_path,
            overrides,
            monitor,
            tui,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let config = Arc::clone(self.monitor.engine().config());
        let mut stats_timer = periodic(config.stats_interval());
        let mut probe_timer = periodic(config.probe_interval());
        let mut ui_timer = periodic(Duration::from_millis(config.ui.refresh_rate));
        let mut events = EventStream::new();

        info!(config = %self.config_path.display(), "monitor started");

        loop {
            tokio::select! {
                _ = stats_timer.tick() => {
                    self.monitor.on_stats_tick();
                }

                _ = probe_timer.tick() => {
                    self.monitor.on_probe_tick();
                }

                Some(event) = self.monitor.probe_rx.recv() => {
                    self.monitor.on_probe_event(event);
                }

                _ = ui_timer.tick() => {
                    self.monitor.drain_probe_events();
                    let view = self.monitor.view();
                    self.tui.draw(&view)?;
                }

                maybe_event = events.next() => {
                    let Some(event) = maybe_event else { break };
                    let Event::Key(key) = event? else { continue };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match self.tui.handle_key(key) {
                        UiAction::Quit => break,
                        UiAction::Reload => {
                            if let Some(config) = self.reload() {
                                stats_timer = periodic(config.stats_interval());
                                probe_timer = periodic(config.probe_interval());
                                ui_timer = periodic(Duration::from_millis(config.ui.refresh_rate));
                            }
                        }
                        UiAction::None => {}
                    }
                }
            }
        }

        info!("monitor stopped");
        Ok(())
    }

    /// Re-read the config file and swap it into the engine. Timers are
    /// recreated by the caller from the returned snapshot.
    fn reload(&mut self) -> Option<Arc<Config>> {
        match Config::load(&self.config_path) {
            Ok(mut config) => {
                self.overrides.apply(&mut config);
                self.monitor.reconfigure(config);
                let applied = Arc::clone(self.monitor.engine().config());
                self.tui.set_status(format!("reloaded {}", self.config_path.display()));
                Some(applied)
            }
            Err(e) => {
                warn!(error = %e, "config reload failed");
                self.tui.set_status(format!("reload failed: {e}"));
                None
            }
        }
    }
}
