use serde::{Serialize, Deserialize};

/// Join a topic prefix and a relative topic with exactly one separator
pub fn join_topic(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }
    if relative.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), relative.trim_start_matches('/'))
}

/// All topic names, derived from one prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicScheme {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "MPD".to_string()
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self { prefix: default_prefix() }
    }
}

impl TopicScheme {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string() }
    }

    pub fn topic(&self, relative: &str) -> String {
        join_topic(&self.prefix, relative)
    }

    /// `{prefix}/song/{attr}`
    pub fn song(&self, attribute: &str) -> String {
        self.topic(&format!("song/{}", attribute))
    }

    /// `{prefix}/player/{attr}`
    pub fn player(&self, attribute: &str) -> String {
        self.topic(&format!("player/{}", attribute))
    }

    /// Topic carrying plain commands
    pub fn command(&self) -> String {
        self.topic("CMD")
    }

    /// Topic carrying volume levels
    pub fn volume_command(&self) -> String {
        self.topic("CMD/volume")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_inserts_separator() {
        assert_eq!(join_topic("MPD", "player/state"), "MPD/player/state");
    }

    #[test]
    fn test_join_avoids_double_separator() {
        assert_eq!(join_topic("MPD/", "player/state"), "MPD/player/state");
        assert_eq!(join_topic("MPD", "/player/state"), "MPD/player/state");
        assert_eq!(join_topic("MPD/", "/player/state"), "MPD/player/state");
    }

    #[test]
    fn test_join_with_empty_side() {
        assert_eq!(join_topic("", "player/state"), "player/state");
        assert_eq!(join_topic("MPD", ""), "MPD");
    }

    #[test]
    fn test_scheme_topics() {
        let topics = TopicScheme::new("home/livingroom/mpd/");
        assert_eq!(topics.song("title"), "home/livingroom/mpd/song/title");
        assert_eq!(topics.player("volume"), "home/livingroom/mpd/player/volume");
        assert_eq!(topics.command(), "home/livingroom/mpd/CMD");
        assert_eq!(topics.volume_command(), "home/livingroom/mpd/CMD/volume");
    }
}
