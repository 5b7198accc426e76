/*
 *  status.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	Player status as seen by the panel, and the source trait that
 *	supplies it once per tick.
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        }
    }
}

/// The four mode flags mirrored on the indicator LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedFlags {
    pub repeat: bool,
    pub random: bool,
    pub single: bool,
    pub consume: bool,
}

impl LedFlags {
    /// Channel order used by the LED hardware: repeat, random, single, consume.
    pub fn channels(&self) -> [bool; 4] {
        [self.repeat, self.random, self.single, self.consume]
    }
}

/// One poll's worth of player state. Times are seconds; `None` means the
/// player did not report the field.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub elapsed: Option<f64>,
    pub duration: Option<f64>,
    pub volume: Option<u8>,
    pub song_id: Option<u32>,
    pub track_number: Option<u32>,
    pub repeat: bool,
    pub random: bool,
    pub single: bool,
    pub consume: bool,
}

impl PlaybackStatus {
    pub fn stopped() -> Self {
        Self {
            state: PlaybackState::Stopped,
            elapsed: None,
            duration: None,
            volume: None,
            song_id: None,
            track_number: None,
            repeat: false,
            random: false,
            single: false,
            consume: false,
        }
    }

    pub fn led_flags(&self) -> LedFlags {
        LedFlags {
            repeat: self.repeat,
            random: self.random,
            single: self.single,
            consume: self.consume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaylistSummary {
    pub total_tracks: u32,
    pub total_duration_seconds: u64,
}

impl PlaylistSummary {
    /// Sum of per-entry lengths, truncated to whole seconds once at the
    /// end. Entries without a length count as zero.
    pub fn from_durations<I>(durations: I) -> Self
    where
        I: IntoIterator<Item = Option<Duration>>,
    {
        let mut total_tracks = 0u32;
        let mut total = Duration::ZERO;
        for d in durations {
            total_tracks = total_tracks.saturating_add(1);
            total = total.saturating_add(d.unwrap_or_default());
        }
        Self { total_tracks, total_duration_seconds: total.as_secs() }
    }
}

/// What the state machine consumes each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub status: PlaybackStatus,
    pub playlist: PlaylistSummary,
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("cannot reach MPD at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MPD error: {0}")]
    Protocol(#[from] mpd::error::Error),
    #[error("MPD unavailable, next attempt in {0:?}")]
    Backoff(Duration),
}

/// Where player status comes from.
///
/// `poll` is called once per tick; an `Err` makes the panel show the
/// disconnected indicator for that tick.
pub trait StatusSource: Send {
    fn poll(&mut self) -> Result<PlaybackStatus, StatusError>;

    /// Only consulted while stopped.
    fn playlist_summary(&mut self) -> Result<PlaylistSummary, StatusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_summary_truncates_the_total() {
        let summary = PlaylistSummary::from_durations([
            Some(Duration::from_millis(61_900)),
            None,
            Some(Duration::from_millis(4_300)),
        ]);
        assert_eq!(summary.total_tracks, 3);
        assert_eq!(summary.total_duration_seconds, 66);

        // fractions add up across tracks: 33:25 on the panel, not 33:20
        let halves = PlaylistSummary::from_durations(vec![Some(Duration::from_millis(200_500)); 10]);
        assert_eq!(halves.total_duration_seconds, 2005);

        assert_eq!(
            PlaylistSummary::from_durations(Vec::<Option<Duration>>::new()),
            PlaylistSummary::default()
        );
    }

    #[test]
    fn test_led_flags_order() {
        let status = PlaybackStatus {
            random: true,
            consume: true,
            ..PlaybackStatus::stopped()
        };
        assert_eq!(status.led_flags().channels(), [false, true, false, true]);
    }
}
