use std::time::Duration;
use std::time::Instant;

use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::prelude::Point;
use embedded_graphics::text::Baseline;
use embedded_graphics::text::Text;

use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginError;
use crate::plugin::PluginEvent;
use crate::plugin::TickContext;

pub const NAME: &str = "stopwatch";

const WRAP_AT: Duration = Duration::from_secs(99 * 60 + 59);

/// Counts `MM:SS` up from the moment it was activated.
///
/// Every digit gets its own hue. Any input event restarts the count. Without
/// a start time the next tick starts counting from its own moment.
#[derive(Debug, Default)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    shown_secs: Option<u64>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn elapsed(&mut self, now: Instant) -> Duration {
        let start = *self.start_time.get_or_insert(now);
        let duration = now.saturating_duration_since(start);
        if duration >= WRAP_AT {
            self.start_time = Some(now);
            return Duration::ZERO;
        }
        duration
    }

    fn restart(&mut self) {
        self.start_time = None;
        self.shown_secs = None;
    }
}

impl Plugin for Stopwatch {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, moment: &Moment) {
        self.restart();
        self.start_time = Some(moment.now);
    }

    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError> {
        let duration_secs = self.elapsed(cx.moment.now).as_secs();
        if self.shown_secs == Some(duration_secs) {
            return Ok(());
        }

        let text = format!("{:02}:{:02}", duration_secs / 60, duration_secs % 60);
        let glyph = (FONT_5X8.character_size.width + FONT_5X8.character_spacing) as i32;

        cx.canvas.blank();
        for (idx, ch) in text.char_indices() {
            let hue = (duration_secs as f32 / 60.0 + idx as f32 / 5.0) % 1.0;
            let style = MonoTextStyle::new(&FONT_5X8, crate::util::hue_to_rgb(hue));
            cx.canvas.render(&Text::with_baseline(
                &text[idx..idx + ch.len_utf8()],
                Point::new(3 + idx as i32 * glyph, 4),
                style,
                Baseline::Top,
            ));
        }

        self.shown_secs = Some(duration_secs);
        Ok(())
    }

    fn on_deactivate(&mut self) {
        self.restart();
    }

    fn on_input_event(&mut self, _event: &PluginEvent) {
        tracing::debug!("Restarting stopwatch");
        self.restart();
    }
}
