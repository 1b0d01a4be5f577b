use std::time::Duration;
use std::time::Instant;

use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::prelude::Point;
use embedded_graphics::text::Text;

use crate::config::ClockConfig;
use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginError;
use crate::plugin::TickContext;

pub const NAME: &str = "clock";

const RECOLOR_EVERY: Duration = Duration::from_secs(1);

/// `HH:MM` in rainbow colors, shifting hue once a second.
pub struct Clock {
    font: MonoFont<'static>,
    offset: Point,
    hue: f32,
    last_rendered: Option<(String, Instant)>,
}

impl Clock {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            font: config.font.into(),
            offset: Point::new(config.offset_x.into(), config.offset_y.into()),
            hue: 0.0,
            last_rendered: None,
        }
    }
}

impl Plugin for Clock {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, _moment: &Moment) {
        self.last_rendered = None;
    }

    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError> {
        let time_str = cx
            .moment
            .local
            .format(time::macros::format_description!("[hour]:[minute]"))
            .map_err(PluginError::TimeFormatting)?;

        let stale = match self.last_rendered.as_ref() {
            None => true,
            Some((text, at)) => {
                *text != time_str
                    || cx.moment.now.saturating_duration_since(*at) >= RECOLOR_EVERY
            }
        };
        if !stale {
            return Ok(());
        }

        let color = crate::util::hue_to_rgb(self.hue);
        self.hue = (self.hue + 0.01) % 1.0;

        cx.canvas.blank();
        cx.canvas
            .render(&Text::new(&time_str, self.offset, MonoTextStyle::new(&self.font, color)));
        tracing::trace!(?time_str, "Rendered clock");

        self.last_rendered = Some((time_str, cx.moment.now));
        Ok(())
    }
}
