/*
 *  playback.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	Per-tick decision of what the panel shows: timed volume and track
 *	overlays, the paused blink, the stopped cycle and the disconnected
 *	indicator.
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

use log::{debug, info};
use std::time::Duration;
use tempo_driver_tm1637::{DisplayFrame, Glyph, DIGIT_COUNT};

use crate::config::DisplayMode;
use crate::settings::Settings;
use crate::status::{LedFlags, PlaybackState, PlaybackStatus, PlaylistSummary, Snapshot};

/// Largest clock value that fits, 99:59.
pub const MAX_CLOCK_SECONDS: u32 = 99 * 60 + 59;

/// Colon alone, nothing else lit. Never produced by normal rendering.
pub const DISCONNECTED: DisplayFrame = DisplayFrame::new([Glyph::Blank; DIGIT_COUNT], true);

/// `mm:ss` from a seconds count, fractions truncated.
///
/// Minutes are total minutes, so an hour reads `60:00`. Anything from 100
/// minutes up holds at `99:59`; negative or non-finite input gives dashes.
pub fn clock_frame(seconds: f64) -> DisplayFrame {
    if !seconds.is_finite() {
        return DisplayFrame::dashes();
    }
    let whole = seconds.trunc();
    if whole < 0.0 {
        return DisplayFrame::dashes();
    }
    let whole = if whole >= f64::from(MAX_CLOCK_SECONDS) {
        MAX_CLOCK_SECONDS
    } else {
        whole as u32
    };
    DisplayFrame::time(whole / 60, whole % 60).unwrap_or(DisplayFrame::dashes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStep {
    Dashes,
    TrackTotal,
    TotalTime,
}

impl StopStep {
    fn next(self) -> Self {
        match self {
            StopStep::Dashes => StopStep::TrackTotal,
            StopStep::TrackTotal => StopStep::TotalTime,
            StopStep::TotalTime => StopStep::Dashes,
        }
    }

    fn hold(self, settings: &Settings) -> Duration {
        match self {
            StopStep::Dashes => settings.stop_symbol_time,
            StopStep::TrackTotal => settings.track_total_time,
            StopStep::TotalTime => settings.playlist_time,
        }
    }

    fn frame(self, playlist: &PlaylistSummary) -> DisplayFrame {
        match self {
            StopStep::Dashes => DisplayFrame::dashes(),
            StopStep::TrackTotal => DisplayFrame::track_total(playlist.total_tracks),
            StopStep::TotalTime => {
                let total = u32::try_from(playlist.total_duration_seconds).unwrap_or(u32::MAX);
                clock_frame(f64::from(total))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StopCycle {
    step: StopStep,
    started: Duration,
}

impl StopCycle {
    fn restart(&mut self, now: Duration) {
        self.step = StopStep::Dashes;
        self.started = now;
    }

    /// One step forward at most, once the current one has been held long
    /// enough.
    fn advance(&mut self, now: Duration, settings: &Settings) {
        if now.saturating_sub(self.started) >= self.step.hold(settings) {
            self.step = self.step.next();
            self.started = now;
            debug!("stop cycle -> {:?}", self.step);
        }
    }
}

/// A frame that wins over normal rendering until `until`.
#[derive(Debug, Clone, Copy)]
struct Overlay {
    frame: DisplayFrame,
    until: Duration,
}

impl Overlay {
    fn armed(frame: DisplayFrame, now: Duration, hold: Duration) -> Self {
        Self { frame, until: now.saturating_add(hold) }
    }

    fn active(&self, now: Duration) -> bool {
        now < self.until
    }
}

/// What the previous connected tick saw.
#[derive(Debug, Clone, Copy)]
struct Seen {
    state: PlaybackState,
    volume: Option<u8>,
    song_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    Show(LedFlags),
    AllOff,
}

/// Everything one tick asks of the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub frame: DisplayFrame,
    pub leds: LedCommand,
    pub overlay_active: bool,
    pub connected: bool,
}

impl TickOutcome {
    /// Sleep before the next tick: the fast interval while an overlay is
    /// counting down.
    pub fn interval(&self, settings: &Settings) -> Duration {
        if self.overlay_active {
            settings.volume_update_interval
        } else {
            settings.update_interval
        }
    }
}

pub struct PlaybackStateMachine {
    seen: Option<Seen>,
    online: bool,
    volume: Option<Overlay>,
    track: Option<Overlay>,
    stop: StopCycle,
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self {
            seen: None,
            online: false,
            volume: None,
            track: None,
            stop: StopCycle { step: StopStep::Dashes, started: Duration::ZERO },
        }
    }

    /// Player state as of this tick, `None` while disconnected.
    pub fn state(&self) -> Option<PlaybackState> {
        self.seen.filter(|_| self.online).map(|s| s.state)
    }

    pub fn stop_step(&self) -> StopStep {
        self.stop.step
    }

    /// Advance one tick. `snapshot` is `None` when the player could not be
    /// read; `now` is monotonic time from any fixed origin.
    pub fn update(&mut self, snapshot: Option<&Snapshot>, settings: &Settings, now: Duration) -> TickOutcome {
        let Some(snapshot) = snapshot else {
            if std::mem::replace(&mut self.online, false) {
                info!("MPD unavailable, showing disconnected");
            }
            self.volume = None;
            self.track = None;
            return TickOutcome {
                frame: DISCONNECTED,
                leds: LedCommand::AllOff,
                overlay_active: false,
                connected: false,
            };
        };
        let status = &snapshot.status;
        if !self.online && self.seen.is_some() {
            info!("MPD back, state {}", status.state.as_str());
        }
        self.online = true;

        self.track_changes(status, settings, now);
        self.expire(now);

        let playing = status.state == PlaybackState::Playing;
        let frame = match (self.volume, self.track) {
            (Some(volume), _) => volume.frame,
            (None, Some(track)) if playing => track.frame,
            _ => self.normal_frame(snapshot, settings, now),
        };

        TickOutcome {
            frame,
            leds: LedCommand::Show(status.led_flags()),
            overlay_active: self.volume.is_some() || (playing && self.track.is_some()),
            connected: true,
        }
    }

    fn track_changes(&mut self, status: &PlaybackStatus, settings: &Settings, now: Duration) {
        let seen = self.seen.replace(Seen {
            state: status.state,
            volume: status.volume,
            song_id: status.song_id,
        });

        let Some(seen) = seen else {
            info!("MPD state {}", status.state.as_str());
            self.volume = None;
            self.track = None;
            if status.state == PlaybackState::Stopped {
                self.stop.restart(now);
            }
            if status.state == PlaybackState::Playing {
                self.arm_track(status, settings, now);
            }
            return;
        };

        if seen.state != status.state {
            info!("MPD state {} -> {}", seen.state.as_str(), status.state.as_str());
            if status.state == PlaybackState::Stopped {
                self.stop.restart(now);
            }
        }

        if seen.volume != status.volume {
            self.volume = status
                .volume
                .and_then(|v| DisplayFrame::volume(u32::from(v)))
                .map(|frame| Overlay::armed(frame, now, settings.volume_display_duration));
            debug!("volume {:?} -> {:?}", seen.volume, status.volume);
        }

        let entering = seen.state != PlaybackState::Playing || seen.song_id != status.song_id;
        if status.state == PlaybackState::Playing && entering {
            self.arm_track(status, settings, now);
        }
    }

    fn arm_track(&mut self, status: &PlaybackStatus, settings: &Settings, now: Duration) {
        self.track = status
            .track_number
            .and_then(DisplayFrame::track_number)
            .map(|frame| Overlay::armed(frame, now, settings.track_number_time));
        if let Some(track) = status.track_number {
            debug!("track {} overlay {}", track, if self.track.is_some() { "armed" } else { "skipped" });
        }
    }

    fn expire(&mut self, now: Duration) {
        if self.volume.is_some_and(|o| !o.active(now)) {
            debug!("volume overlay expired");
            self.volume = None;
        }
        if self.track.is_some_and(|o| !o.active(now)) {
            debug!("track overlay expired");
            self.track = None;
        }
    }

    fn normal_frame(&mut self, snapshot: &Snapshot, settings: &Settings, now: Duration) -> DisplayFrame {
        let status = &snapshot.status;
        match status.state {
            PlaybackState::Playing => position_frame(status, settings.mode),
            PlaybackState::Paused => {
                let blink = settings.blink_interval.as_secs_f64();
                let phase = (now.as_secs_f64() / blink).floor() as u64 % 2;
                if phase == 0 {
                    position_frame(status, settings.mode)
                } else {
                    DisplayFrame::blank()
                }
            }
            PlaybackState::Stopped => {
                self.stop.advance(now, settings);
                self.stop.step.frame(&snapshot.playlist)
            }
        }
    }
}

/// Elapsed or remaining time for the current song, dashes when unknown.
fn position_frame(status: &PlaybackStatus, mode: DisplayMode) -> DisplayFrame {
    let Some(elapsed) = status.elapsed else {
        return DisplayFrame::dashes();
    };
    let seconds = match (mode, status.duration) {
        (DisplayMode::Remaining, Some(duration)) if duration > 0.0 => (duration - elapsed).max(0.0),
        _ => elapsed,
    };
    clock_frame(seconds)
}
