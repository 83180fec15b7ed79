/*
 *  main.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Startup: settings, logging, panel, then the region rotation
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info, warn};
use local_ip_address::local_ip;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use ledmap::config::{self, PanelKind, Settings};
use ledmap::display::drivers::memory::MemoryPanel;
use ledmap::display::{BrightnessSchedule, FrameCompositor, PanelDriver};
use ledmap::metar::{HttpTransport, MetarFetcher};
use ledmap::pacer::TokioSleeper;
use ledmap::region::MapData;
use ledmap::scheduler::AnimationScheduler;
use ledmap::transition::{NoTransition, TitleTransition, Transition};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP
#[cfg(unix)]
async fn signal_handler() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

fn open_panel(settings: &Settings) -> Result<Box<dyn PanelDriver>> {
    let panel = &settings.panel;
    match panel.driver {
        PanelKind::Memory => {
            let mut memory = MemoryPanel::new(panel.width(), panel.height());
            if let Some(path) = panel.snapshot.as_ref() {
                info!("Writing frames to {}", path.display());
                memory = memory.with_snapshot(path);
            }
            Ok(Box::new(memory))
        }
        #[cfg(feature = "plugin-system")]
        PanelKind::Plugin => {
            use ledmap::display::plugin::{PluginLoader, PluginPanelAdapter};
            let plugin = PluginLoader::load(&panel.plugin)?;
            let adapter = PluginPanelAdapter::new(plugin, panel, settings.brightness.default_percent)?;
            info!("Panel driver {} v{}", adapter.plugin_name(), adapter.plugin_version());
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "plugin-system"))]
        PanelKind::Plugin => anyhow::bail!("built without plugin-system, only the memory panel is available"),
    }
}

async fn run_map<X: Transition>(settings: &Settings, transition: X) -> Result<()> {
    let schedule = BrightnessSchedule::from_settings(&settings.brightness)?;
    let comp = FrameCompositor::new(open_panel(settings)?, schedule)?;

    let data = MapData::load(&settings.data).context("loading map data")?;
    let transport = HttpTransport::new(&settings.feed)?;
    let fetcher = MetarFetcher::from_settings(transport, &settings.feed);

    let mut scheduler = AnimationScheduler::new(comp, fetcher, transition, TokioSleeper, data, settings);
    scheduler.run().await?;
    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let wants_transition = {
        let t = &settings.transition;
        t.clock || t.wipe || t.title
    };
    let map = async {
        if wants_transition {
            run_map(&settings, TitleTransition::new(&settings.transition)).await
        } else {
            run_map(&settings, NoTransition).await
        }
    };

    tokio::select! {
        result = map => {
            if let Err(e) = &result {
                error!("Map stopped: {:#}", e);
            }
            result
        }
        result = signal_handler() => {
            result
        }
    }
}

fn main() -> Result<()> {
    let (settings, cli) = config::load()?;

    let level = if cli.debug { "debug".to_string() } else { settings.log_level.clone().unwrap_or_else(|| "info".into()) };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("{} - aviation weather on an LED matrix", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);
    match local_ip() {
        Ok(ip) => info!("Local address {}", ip),
        Err(e) => warn!("No local address: {}", e),
    }
    info!(
        "Panel {}x{} ({:?}), regions {}",
        settings.panel.width(), settings.panel.height(), settings.panel.driver, settings.regions.join(", ")
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(settings))?;

    info!("Shutdown complete");
    Ok(())
}
