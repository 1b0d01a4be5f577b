//! The lifecycle contract every visual program on the sign implements.
//!
//! The scheduler drives a plugin through
//! `setup -> (on_activate -> tick* -> on_deactivate)*`. `setup` runs exactly
//! once at registration. A session starts with `on_activate` and ends with
//! `on_deactivate`; in between, `tick` is called once per loop iteration.

use std::time::Instant;

use crate::display::Canvas;

/// Time snapshot taken once per loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub now: Instant,
    pub local: time::OffsetDateTime,
}

impl Moment {
    pub fn new(now: Instant, local: time::OffsetDateTime) -> Self {
        Self { now, local }
    }

    /// Snapshot of the current time, with wall-clock time in the offset
    /// currently in effect.
    pub fn capture(offset: &mut crate::localtime::LocalOffset) -> Self {
        let now = Instant::now();
        Self::new(now, time::OffsetDateTime::now_utc().to_offset(offset.at(now)))
    }
}

/// What a plugin gets to work with during one `tick`.
pub struct TickContext<'a> {
    pub canvas: &'a mut Canvas,
    pub moment: Moment,
}

/// Opaque payload forwarded from a remote command to the active plugin.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct PluginEvent(pub serde_json::Value);

impl PluginEvent {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Read `key` as a `[x, y]` coordinate pair.
    pub fn point(&self, key: &str) -> Option<(usize, usize)> {
        let pair = self.get(key)?.as_array()?;
        match pair.as_slice() {
            [x, y] => Some((x.as_u64()? as usize, y.as_u64()? as usize)),
            _ => None,
        }
    }

    /// Read `key` as an `[r, g, b]` color.
    pub fn color(&self, key: &str) -> Option<embedded_graphics::pixelcolor::Rgb888> {
        let rgb = self.get(key)?.as_array()?;
        match rgb.as_slice() {
            [r, g, b] => Some(embedded_graphics::pixelcolor::Rgb888::new(
                u8::try_from(r.as_u64()?).ok()?,
                u8::try_from(g.as_u64()?).ok()?,
                u8::try_from(b.as_u64()?).ok()?,
            )),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Error formatting time")]
    TimeFormatting(#[source] time::error::Format),
}

/// One visual program.
///
/// `tick` runs on the same thread that services input and the network, so it
/// must do a bounded amount of work and never block.
///
/// `on_activate` and `on_deactivate` are always paired by the scheduler, but
/// implementations must tolerate being called twice in a row, or without the
/// matching counterpart, and still tick afterwards.
pub trait Plugin {
    /// Stable name, used in configuration, remote commands and status output.
    fn name(&self) -> &'static str;

    /// One-time initialization, called when the plugin is registered.
    fn setup(&mut self) {}

    /// Start a new session. The canvas is blank when the first tick runs.
    fn on_activate(&mut self, moment: &Moment);

    /// Advance and render exactly one frame's worth of work.
    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError>;

    /// End the session, releasing anything acquired in `on_activate`.
    fn on_deactivate(&mut self) {}

    /// Control event from a button or remote command, only while active.
    fn on_input_event(&mut self, _event: &PluginEvent) {}
}

#[cfg(test)]
mod tests {
    use embedded_graphics::pixelcolor::Rgb888;

    use super::PluginEvent;

    #[test]
    fn reads_point_and_color() {
        let event = PluginEvent(serde_json::json!({
            "set": [3, 4],
            "color": [255, 0, 10],
        }));
        assert_eq!(event.point("set"), Some((3, 4)));
        assert_eq!(event.color("color"), Some(Rgb888::new(255, 0, 10)));
    }

    #[test]
    fn rejects_malformed_values() {
        let event = PluginEvent(serde_json::json!({
            "set": [3],
            "color": [256, 0, 0],
        }));
        assert_eq!(event.point("set"), None);
        assert_eq!(event.color("color"), None);
        assert_eq!(event.point("missing"), None);
    }
}
