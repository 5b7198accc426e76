/*
 *  main.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use tempo::config::{self, Cli, Command};
use tempo::display::{BoxedDriver, DisplayDriver, MockDriver, Tm1637Driver};
use tempo::leds::{BoxedLed, LedSync, MockLed};
use tempo::mpdinfo::MpdServer;
use tempo::settings::{ConfigWatcher, HardwareSettings, MpdSettings, Settings};
use tempo::Scheduler;
use tempo_driver_tm1637::DisplayFrame;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

// keep roughly a minute of frames when nothing reads them
const DRY_RUN_HISTORY: usize = 600;

/// Waits for SIGINT or SIGTERM. SIGHUP belongs to the config watcher.
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("This {} keeps time", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);
}

fn run_command(command: Command, cli: &Cli) -> Result<()> {
    match command {
        Command::ToggleBrightness => {
            let (old, new) = config::toggle_brightness(cli).context("toggle brightness")?;
            println!("brightness {} -> {}", old, new);
        }
        Command::ToggleMode => {
            let (old, new) = config::toggle_mode(cli).context("toggle mode")?;
            println!("mode {} -> {}", old.as_str(), new.as_str());
        }
    }
    Ok(())
}

/// The display and LEDs, real or recorded.
fn open_panel(hw: &HardwareSettings, settings: &Settings, dry_run: bool) -> Result<(BoxedDriver, LedSync)> {
    if dry_run {
        info!("Dry run: no GPIO, frames logged at debug");
        let leds: [BoxedLed; 4] = std::array::from_fn(|_| Box::new(MockLed::default()) as BoxedLed);
        let error = hw.error_led.map(|_| Box::new(MockLed::default()) as BoxedLed);
        let display = MockDriver::new(settings.brightness).with_history(DRY_RUN_HISTORY);
        return Ok((Box::new(display), LedSync::new(leds, error, settings.led_level())));
    }

    let display = Tm1637Driver::open(&hw.chip, hw.clk, hw.dio, settings.brightness)
        .context("TM1637 setup failed")?;
    let leds = LedSync::open(hw, settings.led_level()).context("LED setup failed")?;
    Ok((Box::new(display), leds))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        init_logging(if cli.debug { "debug" } else { cli.log_level.as_deref().unwrap_or("info") });
        return run_command(command, &cli);
    }

    let loaded = config::load(&cli).context("configuration")?;
    let cfg = &loaded.config;

    if cli.dump_config {
        print!("{}", config::dump(cfg)?);
        return Ok(());
    }

    init_logging(cfg.log_level.as_deref().unwrap_or("info"));
    match loaded.path.as_ref() {
        Some(path) => info!("Config ...........: {}", path.display()),
        None => info!("Config ...........: defaults"),
    }

    let settings = Settings::from_config(cfg);
    let hw = HardwareSettings::from_config(cfg);
    let mpd = MpdSettings::from_config(cfg);
    info!(
        "Display ..........: brightness {} mode {}",
        settings.brightness,
        settings.mode.as_str()
    );

    // hardware failures are fatal before the first tick
    let (mut display, leds) = open_panel(&hw, &settings, cli.dry_run)?;
    display.render(&DisplayFrame::dashes()).context("first frame")?;

    let (tx, rx) = watch::channel(Arc::new(settings));
    match loaded.path.clone() {
        Some(path) => {
            let watcher = ConfigWatcher::new(path, cli.clone(), tx);
            tokio::spawn(async move {
                if let Err(e) = watcher.run().await {
                    error!("Config watcher stopped: {}", e);
                }
            });
        }
        None => drop(tx),
    }

    let mut scheduler = Scheduler::new(MpdServer::new(mpd), display, leds, rx);

    tokio::select! {
        res = signal_handler() => {
            if let Err(e) = res {
                error!("Signal handler failed: {}", e);
            }
        }
        _ = scheduler.run() => {}
    }

    info!("Main application exiting. Clearing display and releasing GPIO.");
    scheduler.shutdown();

    Ok(())
}
