/*
 *  mpdinfo.rs
 *
 *  tempo - MPD front panel
 *	(c) 2020-26 Stuart Hunter
 *
 *	MPD backed status source with throttled reconnects.
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
use mpd::{Client, Song, State};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::settings::MpdSettings;
use crate::status::{PlaybackState, PlaybackStatus, PlaylistSummary, StatusError, StatusSource};

pub struct MpdServer {
    settings: MpdSettings,
    client: Option<Client<TcpStream>>,
    /// Earliest time the next connect may be tried.
    next_attempt: Option<Instant>,
}

impl MpdServer {
    /// No I/O happens here; the first `poll` connects.
    pub fn new(settings: MpdSettings) -> Self {
        Self { settings, client: None, next_attempt: None }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn connect(&mut self) -> Result<(), StatusError> {
        if self.client.is_some() {
            return Ok(());
        }

        let now = Instant::now();
        if let Some(at) = self.next_attempt {
            if now < at {
                return Err(StatusError::Backoff(at - now));
            }
        }
        self.next_attempt = Some(now + self.settings.retry_interval);

        let addr = self.addr();
        let stream = open_stream(&self.settings.host, self.settings.port, self.settings.timeout)
            .map_err(|source| StatusError::Connect { addr: addr.clone(), source })?;
        let client = Client::new(stream)?;

        info!("MPD server .........: {}", addr);
        info!("MPD protocol .......: {:?}", client.version);

        self.client = Some(client);
        self.next_attempt = None;
        Ok(())
    }

    /// Run `f` against a live connection. Any MPD error drops the connection
    /// so the next call reconnects.
    fn with_client<T, F>(&mut self, f: F) -> Result<T, StatusError>
    where
        F: FnOnce(&mut Client<TcpStream>) -> Result<T, mpd::error::Error>,
    {
        self.connect()?;
        let Some(client) = self.client.as_mut() else {
            return Err(StatusError::Backoff(self.settings.retry_interval));
        };
        match f(client) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("MPD connection to {} lost: {}", self.addr(), e);
                self.client = None;
                Err(e.into())
            }
        }
    }
}

impl StatusSource for MpdServer {
    fn poll(&mut self) -> Result<PlaybackStatus, StatusError> {
        self.with_client(|client| {
            let status = client.status()?;
            let song = client.currentsong()?;
            Ok(playback_status(&status, song.as_ref()))
        })
    }

    fn playlist_summary(&mut self) -> Result<PlaylistSummary, StatusError> {
        self.with_client(|client| {
            let queue = client.queue()?;
            Ok(PlaylistSummary::from_durations(queue.iter().map(|s| s.duration)))
        })
    }
}

impl Drop for MpdServer {
    fn drop(&mut self) {
        if self.client.is_some() {
            debug!("MpdServer dropped. Closing connection to {}", self.addr());
        }
    }
}

fn open_stream(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

fn playback_status(status: &mpd::Status, song: Option<&Song>) -> PlaybackStatus {
    let state = match status.state {
        State::Play => PlaybackState::Playing,
        State::Pause => PlaybackState::Paused,
        State::Stop => PlaybackState::Stopped,
    };

    let duration = status
        .duration
        .or_else(|| song.and_then(|s| s.duration))
        .map(|d| d.as_secs_f64());

    PlaybackStatus {
        state,
        elapsed: status.elapsed.map(|d| d.as_secs_f64()),
        duration,
        volume: volume_percent(status.volume),
        song_id: status.song.as_ref().map(|place| place.id.0),
        track_number: song.and_then(|s| track_tag(&s.tags)),
        repeat: status.repeat,
        random: status.random,
        single: status.single,
        consume: status.consume,
    }
}

/// MPD reports -1 when no mixer is available.
pub fn volume_percent(raw: i8) -> Option<u8> {
    u8::try_from(raw).ok().map(|v| v.min(100))
}

fn track_tag(tags: &[(String, String)]) -> Option<u32> {
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Track"))
        .and_then(|(_, v)| parse_track_tag(v))
}

/// `"7"`, `"07"` and `"7/12"` all mean track 7.
pub fn parse_track_tag(raw: &str) -> Option<u32> {
    raw.split('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_parse_track_tag() {
        assert_eq!(parse_track_tag("7"), Some(7));
        assert_eq!(parse_track_tag("07"), Some(7));
        assert_eq!(parse_track_tag("3/12"), Some(3));
        assert_eq!(parse_track_tag(" 11 / 20"), Some(11));
        assert_eq!(parse_track_tag(""), None);
        assert_eq!(parse_track_tag("A1"), None);
    }

    #[test]
    fn test_track_tag_lookup() {
        let tags = vec![
            ("Artist".to_string(), "Someone".to_string()),
            ("track".to_string(), "4/9".to_string()),
        ];
        assert_eq!(track_tag(&tags), Some(4));
        assert_eq!(track_tag(&[]), None);
    }

    #[test]
    fn test_volume_percent() {
        assert_eq!(volume_percent(-1), None);
        assert_eq!(volume_percent(0), Some(0));
        assert_eq!(volume_percent(55), Some(55));
        assert_eq!(volume_percent(100), Some(100));
    }

    #[test]
    fn test_reconnect_is_throttled() {
        // grab a free port, then close it so connects are refused
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let mut server = MpdServer::new(MpdSettings {
            host: "127.0.0.1".into(),
            port,
            retry_interval: Duration::from_secs(60),
            timeout: Duration::from_millis(200),
        });

        assert!(matches!(server.poll(), Err(StatusError::Connect { .. })));
        assert!(matches!(server.poll(), Err(StatusError::Backoff(_))));
        assert!(matches!(server.playlist_summary(), Err(StatusError::Backoff(_))));
        assert!(!server.is_connected());
    }
}
