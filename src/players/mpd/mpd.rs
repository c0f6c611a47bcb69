use crate::data::Value;
use crate::error::BackendError;
use crate::players::backend::{Attributes, BackendConnection, Connector, ItemMatch};
use log::{debug, trace, warn};
use mpd::{Client, idle::Subsystem};
use mpd::Idle;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Socket timeout for everything except the idle wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Subsystems the watcher waits on; everything the snapshots mirror
const WATCHED_SUBSYSTEMS: [Subsystem; 3] = [
    Subsystem::Player,
    Subsystem::Mixer,
    Subsystem::Options,
];

/// Opens sessions with an MPD server
#[derive(Debug, Clone)]
pub struct MpdConnector {
    /// MPD server hostname
    hostname: String,

    /// MPD server port
    port: u16,

    /// Optional MPD password
    password: Option<String>,

    /// Connect, read and write timeout; `None` blocks indefinitely
    timeout: Option<Duration>,
}

impl MpdConnector {
    pub fn new(hostname: &str, port: u16) -> Self {
        debug!("Creating MPD connector for {}:{}", hostname, port);
        Self {
            hostname: hostname.to_string(),
            port,
            password: None,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// A zero timeout disables it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn open_stream(&self, addr: &str) -> Result<TcpStream, BackendError> {
        let timeout = match self.timeout {
            Some(timeout) => timeout,
            None => return Ok(TcpStream::connect(addr)?),
        };

        let mut last_error = None;
        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    trace!("Connecting to {} failed: {}", socket_addr, e);
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => e.into(),
            None => BackendError::Other(format!("{} did not resolve to any address", addr)),
        })
    }
}

impl Connector for MpdConnector {
    type Connection = MpdConnection;

    fn connect(&self) -> Result<MpdConnection, BackendError> {
        let addr = self.address();
        debug!("Connecting to MPD at {}", addr);

        let stream = self.open_stream(&addr)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        let control = stream.try_clone()?;

        let mut client = Client::new(stream)?;
        if let Some(password) = &self.password {
            debug!("Authenticating with MPD at {}", addr);
            client.login(password)?;
        }

        debug!("Connected to MPD {}.{}.{} at {}",
            client.version.0, client.version.1, client.version.2, addr);
        Ok(MpdConnection {
            client,
            stream: control,
            timeout: self.timeout,
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// One MPD client session
pub struct MpdConnection {
    client: Client<TcpStream>,
    /// Second handle on the client's socket, used to change its timeouts
    stream: TcpStream,
    timeout: Option<Duration>,
}

impl MpdConnection {
    /// Direct access to the underlying client for calls outside the bridge contract
    pub fn client(&mut self) -> &mut Client<TcpStream> {
        &mut self.client
    }
}

impl BackendConnection for MpdConnection {
    fn probe(&mut self) -> Result<(), BackendError> {
        self.client.ping()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.client.close()?;
        Ok(())
    }

    fn query_status(&mut self) -> Result<Attributes, BackendError> {
        let status = self.client.status()?;
        Ok(status_attributes(&status))
    }

    fn query_current_item(&mut self) -> Result<Attributes, BackendError> {
        match self.client.currentsong()? {
            Some(song) => Ok(song_attributes(&song)),
            None => {
                trace!("No current song loaded in MPD");
                Ok(Attributes::new())
            }
        }
    }

    /// Waits without a read timeout; the socket timeout is restored afterwards
    fn wait_for_change(&mut self) -> Result<Vec<String>, BackendError> {
        self.stream.set_read_timeout(None)?;
        let result = self.client.idle(&WATCHED_SUBSYSTEMS)
            .and_then(|idle| idle.get());
        if let Err(e) = self.stream.set_read_timeout(self.timeout) {
            warn!("Failed to restore MPD read timeout: {}", e);
        }

        let subsystems = result?;
        Ok(subsystems.iter()
            .map(|s| format!("{:?}", s).to_lowercase())
            .collect())
    }

    fn set_play(&mut self, single_shot: bool) -> Result<(), BackendError> {
        self.client.single(single_shot)?;
        self.client.play()?;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.client.pause(true)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.client.stop()?;
        Ok(())
    }

    fn skip_next(&mut self) -> Result<(), BackendError> {
        self.client.next()?;
        Ok(())
    }

    fn set_single_mode(&mut self, enabled: bool) -> Result<(), BackendError> {
        self.client.single(enabled)?;
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), BackendError> {
        self.client.volume(volume.min(100) as i8)?;
        Ok(())
    }

    /// Searches the play queue, like MPD's `playlistfind`
    fn find_item(&mut self, tag: &str, value: &str) -> Result<Vec<ItemMatch>, BackendError> {
        let queue = self.client.queue()?;
        let matches: Vec<ItemMatch> = queue.iter()
            .filter(|song| tag_value(song, tag) == Some(value))
            .map(|song| ItemMatch {
                id: song.place.as_ref().map(|place| place.id.0),
                file: song.file.clone(),
                title: song.title.clone(),
            })
            .collect();
        debug!("Found {} queue entries with {}='{}'", matches.len(), tag, value);
        Ok(matches)
    }

    fn play_item(&mut self, id: u32) -> Result<(), BackendError> {
        self.client.switch(mpd::Id(id))?;
        Ok(())
    }

    fn set_consume_mode(&mut self, enabled: bool) -> Result<(), BackendError> {
        self.client.consume(enabled)?;
        Ok(())
    }
}

fn state_name(state: &mpd::State) -> &'static str {
    match state {
        mpd::State::Play => "play",
        mpd::State::Pause => "pause",
        mpd::State::Stop => "stop",
    }
}

/// Player-level attributes of an MPD status response
pub fn status_attributes(status: &mpd::Status) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("state".to_string(), Value::from(state_name(&status.state)));
    // MPD reports -1 when there is no mixer
    if let Some(volume) = volume_value(status.volume) {
        attrs.insert("volume".to_string(), volume);
    }
    attrs.insert("repeat".to_string(), Value::Bool(status.repeat));
    attrs.insert("random".to_string(), Value::Bool(status.random));
    attrs.insert("single".to_string(), Value::Bool(status.single));
    attrs.insert("consume".to_string(), Value::Bool(status.consume));

    // MPD only reports elapsed time while an item is loaded
    if let Some(elapsed) = status.elapsed {
        attrs.insert("elapsed".to_string(), Value::Text(format!("{:.3}", elapsed.as_secs_f64())));
    }
    attrs
}

fn volume_value(volume: i8) -> Option<Value> {
    if volume >= 0 {
        Some(Value::Int(volume as i64))
    } else {
        None
    }
}

/// Now-playing attributes of an MPD song
pub fn song_attributes(song: &mpd::Song) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("file".to_string(), Value::Text(song.file.clone()));

    if let Some(title) = &song.title {
        attrs.insert("title".to_string(), Value::Text(title.clone()));
    }
    if let Some(artist) = &song.artist {
        attrs.insert("artist".to_string(), Value::Text(artist.clone()));
    }
    if let Some(name) = &song.name {
        attrs.insert("name".to_string(), Value::Text(name.clone()));
    }
    if let Some(duration) = song.duration {
        attrs.insert("time".to_string(), Value::Int(duration.as_secs() as i64));
    }
    for (tag, key) in [("Album", "album"), ("Track", "track"), ("Date", "date")] {
        if let Some(value) = tag_value(song, tag) {
            attrs.insert(key.to_string(), Value::Text(value.to_string()));
        }
    }
    if let Some(place) = &song.place {
        attrs.insert("pos".to_string(), Value::Int(place.pos as i64));
        attrs.insert("id".to_string(), Value::Int(place.id.0 as i64));
    }
    attrs
}

/// Value of a tag, including the ones the client lifts into dedicated fields
fn tag_value<'a>(song: &'a mpd::Song, tag: &str) -> Option<&'a str> {
    match tag.to_ascii_lowercase().as_str() {
        "file" => Some(song.file.as_str()),
        "title" => song.title.as_deref(),
        "artist" => song.artist.as_deref(),
        "name" => song.name.as_deref(),
        _ => song.tags.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag))
            .map(|(_, value)| value.as_str()),
    }
}
