use std::time::Duration;
use std::time::Instant;

use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::prelude::Point;
use embedded_graphics::text::Baseline;
use embedded_graphics::text::Text;

use crate::config::MessagesConfig;
use crate::display::Canvas;
use crate::display::NUM_LEDS_X;
use crate::display::NUM_LEDS_Y;

#[derive(Debug)]
struct Message {
    text: String,
    remaining: Option<u32>,
}

#[derive(Debug)]
struct Scroll {
    text: String,
    offset: i32,
    width: i32,
    last_step: Instant,
}

/// Scrolls queued messages across the matrix on a fixed interval.
///
/// The overlay draws into its own canvas; while a message is scrolling the
/// driver shows that canvas instead of the active plugin's.
pub struct MessageOverlay {
    canvas: Canvas,
    messages: Vec<Message>,
    next: usize,
    interval: Duration,
    scroll_step: Duration,
    font: MonoFont<'static>,
    hue: f32,
    last_trigger: Option<Instant>,
    due: bool,
    scroll: Option<Scroll>,
}

impl MessageOverlay {
    pub fn new(config: &MessagesConfig, font: MonoFont<'static>) -> Self {
        Self {
            canvas: Canvas::new(),
            messages: config
                .items
                .iter()
                .map(|item| Message {
                    text: item.text.clone(),
                    remaining: item.repeat,
                })
                .collect(),
            next: 0,
            interval: config.interval,
            scroll_step: config.scroll_step,
            font,
            hue: 0.0,
            last_trigger: None,
            due: false,
            scroll: None,
        }
    }

    /// Queue `text` and show it as soon as the current message is done.
    pub fn show_now(&mut self, text: String, repeat: Option<u32>) {
        tracing::info!(?text, ?repeat, "Queueing message");
        self.messages.push(Message {
            text,
            remaining: Some(repeat.unwrap_or(1)),
        });
        self.next = self.messages.len() - 1;
        self.due = true;
    }

    #[cfg(test)]
    pub fn is_showing(&self) -> bool {
        self.scroll.is_some()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    /// Advance the overlay. Returns whether a message is on screen.
    pub fn update(&mut self, now: Instant) -> bool {
        let last_trigger = *self.last_trigger.get_or_insert(now);

        if self.scroll.is_none()
            && !self.messages.is_empty()
            && (self.due || now.saturating_duration_since(last_trigger) >= self.interval)
        {
            self.start_next(now);
        }

        let Some(scroll) = self.scroll.as_mut() else {
            return false;
        };

        if now.saturating_duration_since(scroll.last_step) < self.scroll_step {
            return true;
        }

        scroll.offset -= 1;
        scroll.last_step = now;
        if scroll.offset <= -scroll.width {
            tracing::debug!(text = %scroll.text, "Message scrolled out");
            self.scroll = None;
            self.canvas.blank();
            return false;
        }

        self.hue = (self.hue + 0.01) % 1.0;
        Self::draw(&mut self.canvas, scroll, &self.font, self.hue);
        true
    }

    fn start_next(&mut self, now: Instant) {
        self.last_trigger = Some(now);
        self.due = false;

        let index = self.next % self.messages.len();
        let message = &mut self.messages[index];
        let text = message.text.clone();

        let exhausted = match message.remaining.as_mut() {
            Some(remaining) if *remaining <= 1 => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };

        if exhausted {
            self.messages.remove(index);
            self.next = index;
        } else {
            self.next = index + 1;
        }

        let glyph = self.font.character_size.width + self.font.character_spacing;
        let scroll = Scroll {
            width: (text.chars().count() as u32 * glyph) as i32,
            offset: NUM_LEDS_X as i32,
            text,
            last_step: now,
        };
        tracing::debug!(text = %scroll.text, "Starting message scroll");
        Self::draw(&mut self.canvas, &scroll, &self.font, self.hue);
        self.scroll = Some(scroll);
    }

    fn draw(canvas: &mut Canvas, scroll: &Scroll, font: &MonoFont<'static>, hue: f32) {
        let top = (NUM_LEDS_Y as i32 - font.character_size.height as i32) / 2;
        let style = MonoTextStyle::new(font, crate::util::hue_to_rgb(hue));
        canvas.blank();
        canvas.render(&Text::with_baseline(
            &scroll.text,
            Point::new(scroll.offset, top),
            style,
            Baseline::Top,
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use super::MessageOverlay;
    use crate::config::MessageConfig;
    use crate::config::MessagesConfig;

    const STEP: Duration = Duration::from_millis(10);

    fn overlay(items: Vec<MessageConfig>) -> MessageOverlay {
        let config = MessagesConfig {
            interval: Duration::from_secs(60),
            scroll_step: STEP,
            items,
        };
        MessageOverlay::new(&config, embedded_graphics::mono_font::ascii::FONT_5X8)
    }

    /// Run until the current message is gone, returning the number of updates.
    fn run_out(overlay: &mut MessageOverlay, mut now: Instant) -> (usize, Instant) {
        let mut updates = 0;
        while overlay.update(now) {
            now += STEP;
            updates += 1;
            assert!(updates < 10_000, "message never finished");
        }
        (updates, now)
    }

    #[test]
    fn nothing_to_show_without_messages() {
        let mut overlay = overlay(Vec::new());
        let t0 = Instant::now();
        assert!(!overlay.update(t0));
        assert!(!overlay.update(t0 + Duration::from_secs(120)));
    }

    #[test]
    fn message_waits_for_interval_then_scrolls_through() {
        let mut overlay = overlay(vec![MessageConfig {
            text: String::from("Hi"),
            repeat: None,
        }]);
        let t0 = Instant::now();
        assert!(!overlay.update(t0));
        assert!(!overlay.update(t0 + Duration::from_secs(59)));

        let start = t0 + Duration::from_secs(60);
        assert!(overlay.update(start));
        assert!(overlay.canvas().lit_count() == 0, "text starts right of the matrix");

        let (updates, _) = run_out(&mut overlay, start);
        // the first update only places the text, then one column per step:
        // from x = 32 until both 5px glyphs left the matrix at x = -10
        assert_eq!(updates, 1 + 41);
        assert!(!overlay.is_showing());
        assert_eq!(overlay.canvas().lit_count(), 0);
    }

    #[test]
    fn scrolling_text_lights_pixels() {
        let mut overlay = overlay(Vec::new());
        let t0 = Instant::now();
        overlay.show_now(String::from("HELLO"), None);
        let mut now = t0;
        let mut max_lit = 0;
        while overlay.update(now) {
            max_lit = max_lit.max(overlay.canvas().lit_count());
            now += STEP;
        }
        assert!(max_lit > 10);
    }

    #[test]
    fn repeat_count_is_honored() {
        let mut overlay = overlay(vec![MessageConfig {
            text: String::from("x"),
            repeat: Some(2),
        }]);
        let mut now = Instant::now();
        overlay.update(now);

        let mut shown = 0;
        for _ in 0..4 {
            now += Duration::from_secs(60);
            if overlay.update(now) {
                shown += 1;
                let (_, end) = run_out(&mut overlay, now);
                now = end;
            }
        }
        assert_eq!(shown, 2);
    }
}
