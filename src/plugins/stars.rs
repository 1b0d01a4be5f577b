use std::time::Duration;
use std::time::Instant;

use embedded_graphics::pixelcolor::Rgb888;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::display::NUM_LEDS_X;
use crate::display::NUM_LEDS_Y;
use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginError;
use crate::plugin::TickContext;

pub const NAME: &str = "stars";

const FRAME: Duration = Duration::from_millis(50);
const FADE_PER_FRAME: u8 = 6;
const NEW_STARS_PER_FRAME: usize = 2;

/// Twinkling stars: random pixels light up and slowly fade out.
pub struct Stars {
    rng: ChaCha8Rng,
    last_frame: Option<Instant>,
}

impl Stars {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            last_frame: None,
        }
    }

    fn star_color(&mut self) -> Rgb888 {
        // mostly white, some slightly blue or warm
        let base = self.rng.gen_range(160..=255u8);
        match self.rng.gen_range(0..6) {
            0 => Rgb888::new(base / 2, base / 2, base),
            1 => Rgb888::new(base, base / 2 + base / 4, base / 3),
            _ => Rgb888::new(base, base, base),
        }
    }
}

impl Plugin for Stars {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, _moment: &Moment) {
        self.last_frame = None;
    }

    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError> {
        if self
            .last_frame
            .is_some_and(|last| cx.moment.now.saturating_duration_since(last) < FRAME)
        {
            return Ok(());
        }
        self.last_frame = Some(cx.moment.now);

        cx.canvas.fade(FADE_PER_FRAME);
        for _ in 0..NEW_STARS_PER_FRAME {
            let x = self.rng.gen_range(0..NUM_LEDS_X);
            let y = self.rng.gen_range(0..NUM_LEDS_Y);
            let color = self.star_color();
            cx.canvas.set(x, y, color);
        }
        Ok(())
    }
}
