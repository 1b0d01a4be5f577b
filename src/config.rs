use std::time::Duration;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    pub display: DisplayConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    pub mqtt: Option<MqttConfig>,

    pub button: Option<ButtonConfig>,

    #[serde(default)]
    pub messages: MessagesConfig,

    pub dim: Option<DimConfig>,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub time: TimeConfig,
}

#[derive(Debug, serde::Deserialize)]
pub struct DisplayConfig {
    pub host: std::net::IpAddr,
    pub port: u16,
    pub udp_port: u16,
    pub initial_brightness: u8,

    #[serde(default)]
    pub font: Font,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum Font {
    #[default]
    Font5x8,
    Font6x10,
}

impl From<Font> for embedded_graphics::mono_font::MonoFont<'static> {
    fn from(value: Font) -> Self {
        match value {
            Font::Font5x8 => embedded_graphics::mono_font::ascii::FONT_5X8,
            Font::Font6x10 => embedded_graphics::mono_font::ascii::FONT_6X10,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SchedulerConfig {
    /// Length of one main loop iteration.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Longest a single plugin tick may take before it is reported.
    #[serde(with = "humantime_serde")]
    pub tick_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            tick_budget: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct PluginsConfig {
    /// Plugins to register, in selection order. All bundled plugins if unset.
    pub order: Option<Vec<String>>,

    /// Seed for the generative plugins, random if unset.
    pub seed: Option<u64>,

    #[serde(default)]
    pub clock: ClockConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ClockConfig {
    pub font: Font,
    pub offset_x: u8,
    pub offset_y: u8,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            font: Font::Font6x10,
            offset_x: 1,
            offset_y: 12,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MqttConfig {
    pub host: std::net::IpAddr,
    pub port: u16,
    pub qos: Qos,
    pub client_name: String,

    #[serde(with = "humantime_serde")]
    pub keep_alive: std::time::Duration,

    /// Pause after a connection error before polling the broker again.
    #[serde(default = "default_reconnect_interval", with = "humantime_serde")]
    pub reconnect_interval: std::time::Duration,

    pub topic_prefix: String,
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[expect(clippy::enum_variant_names, reason = "That's the names")]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for rumqttc::v5::mqttbytes::QoS {
    fn from(value: Qos) -> Self {
        match value {
            Qos::AtMostOnce => rumqttc::v5::mqttbytes::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::v5::mqttbytes::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::v5::mqttbytes::QoS::ExactlyOnce,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ButtonConfig {
    /// GPIO value file, e.g. `/sys/class/gpio/gpio17/value`
    pub path: camino::Utf8PathBuf,

    #[serde(default)]
    pub active_low: bool,

    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_debounce() -> Duration {
    Duration::from_millis(50)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(5)
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MessagesConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Time per one-pixel scroll step.
    #[serde(with = "humantime_serde")]
    pub scroll_step: Duration,

    #[serde(default)]
    pub items: Vec<MessageConfig>,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            scroll_step: Duration::from_millis(60),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MessageConfig {
    pub text: String,

    /// Number of times to show the message, forever if unset.
    pub repeat: Option<u32>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DimConfig {
    pub night_start: TimeOfDay,
    pub night_end: TimeOfDay,
    pub night_brightness: u8,

    #[serde(default = "default_dim_check_interval", with = "humantime_serde")]
    pub check_interval: Duration,
}

fn default_dim_check_interval() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct ScheduleConfig {
    #[serde(default, with = "humantime_serde")]
    pub rotate_every: Option<Duration>,

    #[serde(default)]
    pub daily: Vec<DailyEntryConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DailyEntryConfig {
    pub at: TimeOfDay,
    pub plugin: String,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct TimeConfig {
    /// Fixed offset from UTC in minutes. The system timezone is followed if
    /// unset.
    pub utc_offset_minutes: Option<i16>,
}

impl TimeConfig {
    pub fn local_offset(&self) -> crate::localtime::LocalOffset {
        if let Some(minutes) = self.utc_offset_minutes {
            match time::UtcOffset::from_whole_seconds(i32::from(minutes) * 60) {
                Ok(offset) => return crate::localtime::LocalOffset::Fixed(offset),
                Err(error) => tracing::warn!(minutes, %error, "Invalid UTC offset, ignoring"),
            }
        }
        crate::localtime::LocalOffset::system()
    }
}

/// Wall-clock time of day, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn minutes_since_midnight(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTimeOfDay(s.to_string());
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u8 = hour.trim().parse().map_err(|_| invalid())?;
        let minute: u8 = minute.trim().parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Config {
    pub async fn load(path: &camino::Utf8Path) -> Result<Self, ConfigError> {
        let config_str =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadingFile {
                    path: path.to_path_buf(),
                    source,
                })?;

        toml::from_str(&config_str).map_err(ConfigError::ParsingConfig)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from path '{}'", .path)]
    ReadingFile {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No configuration file given, pass one with --config")]
    NoConfigFile,

    #[error(transparent)]
    ParsingConfig(#[from] toml::de::Error),

    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("Unknown plugin '{0}'")]
    UnknownPlugin(String),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Config;
    use super::Font;
    use super::TimeOfDay;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [display]
            host = "10.0.0.20"
            port = 4048
            udp_port = 4048
            initial_brightness = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.display.font, Font::Font5x8);
        assert_eq!(config.scheduler.tick_interval, Duration::from_millis(10));
        assert!(config.plugins.order.is_none());
        assert!(config.mqtt.is_none());
        assert!(config.button.is_none());
        assert!(config.dim.is_none());
        assert_eq!(config.messages.interval, Duration::from_secs(60));
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(include_str!("../config.example.toml")).unwrap();
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.reconnect_interval, Duration::from_secs(10));
        assert_eq!(config.schedule.daily[0].at, TimeOfDay { hour: 7, minute: 0 });
        assert_eq!(config.button.unwrap().debounce, Duration::from_millis(50));
        assert!(!config.messages.items.is_empty());
    }

    #[test]
    fn configured_offset_wins_over_system() {
        use crate::localtime::LocalOffset;

        let time = super::TimeConfig {
            utc_offset_minutes: Some(-90),
        };
        assert!(matches!(
            time.local_offset(),
            LocalOffset::Fixed(offset) if offset.whole_minutes() == -90
        ));

        let unset = super::TimeConfig::default();
        assert!(matches!(unset.local_offset(), LocalOffset::System { .. }));

        let out_of_range = super::TimeConfig {
            utc_offset_minutes: Some(i16::MAX),
        };
        assert!(matches!(
            out_of_range.local_offset(),
            LocalOffset::System { .. }
        ));
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!(
            "22:05".parse::<TimeOfDay>().unwrap(),
            TimeOfDay {
                hour: 22,
                minute: 5
            }
        );
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("7".parse::<TimeOfDay>().is_err());
        assert!("ab:cd".parse::<TimeOfDay>().is_err());
        assert_eq!(TimeOfDay { hour: 7, minute: 3 }.to_string(), "07:03");
    }

    #[test]
    fn bad_time_of_day_fails_config() {
        let res = toml::from_str::<Config>(
            r#"
            [display]
            host = "10.0.0.20"
            port = 4048
            udp_port = 4048
            initial_brightness = 50

            [dim]
            night_start = "25:00"
            night_end = "07:00"
            night_brightness = 5
            "#,
        );
        assert!(res.is_err());
    }
}
