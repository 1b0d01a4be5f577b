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

pub const NAME: &str = "rain";

const FRAME: Duration = Duration::from_millis(40);
const MAX_DROPS: usize = 12;
const TRAIL_FADE: u8 = 40;

#[derive(Debug)]
struct Raindrop {
    x: usize,
    y: f32,
    speed: f32,
}

/// Drops falling down the matrix and leaving a fading trail.
pub struct Rain {
    rng: ChaCha8Rng,
    drops: Vec<Raindrop>,
    last_frame: Option<Instant>,
}

impl Rain {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            drops: Vec::with_capacity(MAX_DROPS),
            last_frame: None,
        }
    }

    fn spawn(&mut self) -> Raindrop {
        Raindrop {
            x: self.rng.gen_range(0..NUM_LEDS_X),
            y: 0.0,
            speed: self.rng.gen_range(0.3..1.0),
        }
    }
}

impl Plugin for Rain {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, _moment: &Moment) {
        self.drops.clear();
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

        cx.canvas.fade(TRAIL_FADE);

        self.drops.retain(|drop| (drop.y as usize) < NUM_LEDS_Y);
        if self.drops.len() < MAX_DROPS && self.rng.gen_bool(0.5) {
            let drop = self.spawn();
            self.drops.push(drop);
        }

        for drop in self.drops.iter_mut() {
            cx.canvas.set(drop.x, drop.y as usize, Rgb888::new(90, 140, 255));
            drop.y += drop.speed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::Rain;
    use super::MAX_DROPS;
    use crate::display::Canvas;
    use crate::plugin::Moment;
    use crate::plugin::Plugin;
    use crate::plugin::TickContext;

    #[test]
    fn drops_are_bounded_and_fall() {
        let mut rain = Rain::new(ChaCha8Rng::seed_from_u64(3));
        let mut canvas = Canvas::new();
        let t0 = Instant::now();
        rain.on_activate(&Moment::new(t0, time::OffsetDateTime::UNIX_EPOCH));

        for frame in 0..500u64 {
            rain.tick(&mut TickContext {
                canvas: &mut canvas,
                moment: Moment::new(
                    t0 + Duration::from_millis(40 * frame),
                    time::OffsetDateTime::UNIX_EPOCH,
                ),
            })
            .unwrap();
            assert!(rain.drops.len() <= MAX_DROPS);
        }
        assert!(canvas.lit_count() > 0);
        assert!(rain.drops.iter().all(|d| d.y > 0.0));
    }
}
