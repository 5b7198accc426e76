/*
 *  scheduler.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	The tick loop: poll, decide, render, sync LEDs, sleep.
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

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::display::BoxedDriver;
use crate::leds::LedSync;
use crate::pacer::Pacer;
use crate::playback::{LedCommand, PlaybackStateMachine, TickOutcome};
use crate::settings::Settings;
use crate::status::{PlaybackState, PlaylistSummary, Snapshot, StatusError, StatusSource};

pub struct Scheduler<S> {
    source: S,
    display: BoxedDriver,
    leds: LedSync,
    settings: watch::Receiver<Arc<Settings>>,
    machine: PlaybackStateMachine,
    pacer: Pacer,
    connected: Option<bool>,
}

impl<S: StatusSource> Scheduler<S> {
    pub fn new(
        source: S,
        display: BoxedDriver,
        leds: LedSync,
        settings: watch::Receiver<Arc<Settings>>,
    ) -> Self {
        Self {
            source,
            display,
            leds,
            settings,
            machine: PlaybackStateMachine::new(),
            pacer: Pacer::new(),
            connected: None,
        }
    }

    pub fn machine(&self) -> &PlaybackStateMachine {
        &self.machine
    }

    /// One tick against the real clock; returns how long to sleep.
    pub fn tick(&mut self) -> Duration {
        let now = self.pacer.start_tick();
        let outcome = self.tick_at(now);
        let settings = self.settings.borrow().clone();
        self.pacer.remaining(outcome.interval(&settings))
    }

    /// One tick at `now` (monotonic, any origin).
    pub fn tick_at(&mut self, now: Duration) -> TickOutcome {
        // one snapshot for the whole tick, even if a reload lands meanwhile
        let settings = self.settings.borrow_and_update().clone();
        self.apply_settings(&settings);

        let snapshot = self.snapshot();
        let outcome = self.machine.update(snapshot.as_ref(), &settings, now);

        if let Err(e) = self.display.render(&outcome.frame) {
            warn!("Render failed: {}", e);
        }

        let changed = self.connected != Some(outcome.connected);
        match outcome.leds {
            LedCommand::Show(flags) => self.leds.apply(flags),
            LedCommand::AllOff if changed => self.leds.all_off(),
            LedCommand::AllOff => {}
        }
        if changed {
            self.leds.set_error(!outcome.connected);
            self.connected = Some(outcome.connected);
        }
        outcome
    }

    pub async fn run(&mut self) {
        info!("Panel loop running");
        loop {
            let sleep = self.tick();
            tokio::time::sleep(sleep).await;
        }
    }

    /// Blank and switch off the panel, let go of its lines, then the LEDs.
    pub fn shutdown(self) {
        let Self { mut display, mut leds, .. } = self;
        if let Err(e) = display.clear() {
            warn!("Clear on shutdown failed: {}", e);
        }
        if let Err(e) = display.display_off() {
            warn!("Display off on shutdown failed: {}", e);
        }
        drop(display);
        leds.all_off();
        leds.set_error(false);
        info!("Panel shut down");
    }

    fn apply_settings(&mut self, settings: &Settings) {
        if self.display.brightness() != settings.brightness {
            info!("Brightness {} -> {}", self.display.brightness(), settings.brightness);
            if let Err(e) = self.display.set_brightness(settings.brightness) {
                warn!("Brightness change failed: {}", e);
            }
        }
        self.leds.set_level(settings.led_level());
    }

    fn snapshot(&mut self) -> Option<Snapshot> {
        let status = match self.source.poll() {
            Ok(status) => status,
            Err(e) => {
                self.report(e);
                return None;
            }
        };
        // the playlist only matters to the stopped cycle
        let playlist = if status.state == PlaybackState::Stopped {
            match self.source.playlist_summary() {
                Ok(playlist) => playlist,
                Err(e) => {
                    self.report(e);
                    return None;
                }
            }
        } else {
            PlaylistSummary::default()
        };
        Some(Snapshot { status, playlist })
    }

    fn report(&self, e: StatusError) {
        match e {
            StatusError::Backoff(_) => debug!("{}", e),
            _ if self.connected != Some(false) => warn!("{}", e),
            _ => debug!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MockDriver;
    use crate::leds::{BoxedLed, MockLed};
    use crate::status::{LedFlags, PlaybackStatus};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Script {
        polls: Arc<Mutex<VecDeque<Option<PlaybackStatus>>>>,
        playlist_calls: Arc<Mutex<usize>>,
    }

    impl Script {
        fn push(&self, status: Option<PlaybackStatus>) {
            self.polls.lock().unwrap().push_back(status);
        }
    }

    impl StatusSource for Script {
        fn poll(&mut self) -> Result<PlaybackStatus, StatusError> {
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .ok_or(StatusError::Backoff(Duration::ZERO))
        }

        fn playlist_summary(&mut self) -> Result<PlaylistSummary, StatusError> {
            *self.playlist_calls.lock().unwrap() += 1;
            Ok(PlaylistSummary { total_tracks: 3, total_duration_seconds: 600 })
        }
    }

    struct Bench {
        scheduler: Scheduler<Script>,
        script: Script,
        panel: MockDriver,
        leds: [MockLed; 4],
        error: MockLed,
        tx: watch::Sender<Arc<Settings>>,
    }

    fn bench() -> Bench {
        let script = Script::default();
        let panel = MockDriver::new(2);
        let leds: [MockLed; 4] = Default::default();
        let error = MockLed::default();
        let boxed: [BoxedLed; 4] = [
            Box::new(leds[0].clone()),
            Box::new(leds[1].clone()),
            Box::new(leds[2].clone()),
            Box::new(leds[3].clone()),
        ];
        let settings = Settings::default();
        let sync = LedSync::new(boxed, Some(Box::new(error.clone())), settings.led_level());
        let (tx, rx) = watch::channel(Arc::new(settings));
        let scheduler = Scheduler::new(script.clone(), Box::new(panel.clone()), sync, rx);
        Bench { scheduler, script, panel, leds, error, tx }
    }

    fn playing() -> PlaybackStatus {
        PlaybackStatus {
            state: PlaybackState::Playing,
            elapsed: Some(65.0),
            duration: Some(130.0),
            volume: Some(50),
            song_id: Some(4),
            repeat: true,
            ..PlaybackStatus::stopped()
        }
    }

    #[test]
    fn test_tick_renders_and_syncs_leds() {
        let mut b = bench();
        b.script.push(Some(playing()));
        let out = b.scheduler.tick_at(Duration::ZERO);

        assert_eq!(b.panel.rendered(), vec!["01:05"]);
        assert_eq!(out.leds, LedCommand::Show(LedFlags { repeat: true, ..LedFlags::default() }));
        assert_eq!(b.leds[0].writes(), vec![30]);
        assert_eq!(b.leds[1].writes(), vec![0]);
        assert_eq!(b.error.writes(), vec![0]);
        // not stopped, so no playlist fetch
        assert_eq!(*b.script.playlist_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_playlist_fetched_only_when_stopped() {
        let mut b = bench();
        b.script.push(Some(PlaybackStatus::stopped()));
        b.script.push(Some(PlaybackStatus::stopped()));
        b.scheduler.tick_at(Duration::ZERO);
        b.scheduler.tick_at(Duration::from_secs(2));

        assert_eq!(*b.script.playlist_calls.lock().unwrap(), 2);
        assert_eq!(b.panel.rendered(), vec!["----", "03--"]);
    }

    #[test]
    fn test_disconnect_lights_error_led_once() {
        let mut b = bench();
        b.script.push(Some(playing()));
        b.script.push(None);
        b.script.push(None);
        b.script.push(Some(playing()));

        for t in 0..4 {
            b.scheduler.tick_at(Duration::from_secs(t));
        }

        assert_eq!(b.panel.rendered(), vec!["01:05", "  :  ", "  :  ", "01:05"]);
        // on, forced off once, back on after recovery
        assert_eq!(b.leds[0].writes(), vec![30, 0, 30]);
        assert_eq!(b.error.writes(), vec![0, 30, 0]);
    }

    #[test]
    fn test_reload_applies_brightness_and_led_level() {
        let mut b = bench();
        b.script.push(Some(playing()));
        b.script.push(Some(playing()));
        b.scheduler.tick_at(Duration::ZERO);

        b.tx.send_replace(Arc::new(Settings { brightness: 6, ..Settings::default() }));
        b.scheduler.tick_at(Duration::from_secs(1));

        assert_eq!(b.panel.state().lock().unwrap().brightness_writes, vec![6]);
        assert_eq!(b.leds[0].writes(), vec![30, 90]);
    }

    #[test]
    fn test_shutdown_order() {
        let mut b = bench();
        b.script.push(Some(playing()));
        b.scheduler.tick_at(Duration::ZERO);
        b.scheduler.shutdown();

        let state = b.panel.state();
        let state = state.lock().unwrap();
        assert_eq!(state.clear_count, 1);
        assert!(state.is_off);
        assert_eq!(b.leds[0].writes(), vec![30, 0]);
        assert_eq!(b.error.writes(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_ticking() {
        let mut b = bench();
        for _ in 0..3 {
            b.script.push(Some(playing()));
        }
        let _ = tokio::time::timeout(Duration::from_millis(2500), b.scheduler.run()).await;
        assert_eq!(b.panel.rendered().len(), 3);
    }
}
