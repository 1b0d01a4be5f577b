use std::time::Duration;
use std::time::Instant;

use embedded_graphics::pixelcolor::Rgb888;

use crate::display::NUM_LEDS_X;
use crate::display::NUM_LEDS_Y;
use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginError;
use crate::plugin::TickContext;

pub const NAME: &str = "running_light";

const STEP: Duration = Duration::from_millis(100);

/// Single pixel walking the matrix row by row, changing color every lap.
#[derive(Debug, Default)]
pub struct RunningLight {
    x_offset: usize,
    y_offset: usize,
    previous: Option<(usize, usize)>,
    lap: usize,
    last_step: Option<Instant>,
}

impl RunningLight {
    pub fn new() -> Self {
        Self::default()
    }

    fn color(&self) -> Rgb888 {
        crate::util::hue_to_rgb(self.lap as f32 * 0.17)
    }

    fn advance(&mut self) {
        self.previous = Some((self.x_offset, self.y_offset));
        self.x_offset += 1;

        if self.x_offset == NUM_LEDS_X {
            self.x_offset = 0;
            self.y_offset += 1;
        }

        if self.y_offset == NUM_LEDS_Y {
            self.y_offset = 0;
            self.lap += 1;
        }

        tracing::trace!(x = self.x_offset, y = self.y_offset, "Moving running light");
    }
}

impl Plugin for RunningLight {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, moment: &Moment) {
        self.x_offset = 0;
        self.y_offset = 0;
        self.previous = None;
        self.last_step = Some(moment.now);
    }

    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError> {
        let last_step = self.last_step.get_or_insert(cx.moment.now);
        if cx.moment.now.saturating_duration_since(*last_step) >= STEP {
            *last_step = cx.moment.now;
            self.advance();
        }

        if let Some((x, y)) = self.previous.take() {
            cx.canvas.set(x, y, Rgb888::default());
        }
        cx.canvas.set(self.x_offset, self.y_offset, self.color());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use super::RunningLight;
    use crate::display::Canvas;
    use crate::display::NUM_LEDS_X;
    use crate::plugin::Moment;
    use crate::plugin::Plugin;
    use crate::plugin::TickContext;

    #[test]
    fn exactly_one_pixel_is_lit_and_it_wraps_rows() {
        let mut light = RunningLight::new();
        let mut canvas = Canvas::new();
        let t0 = Instant::now();
        light.on_activate(&Moment::new(t0, time::OffsetDateTime::UNIX_EPOCH));

        for step in 0..=NUM_LEDS_X as u64 {
            let now = t0 + Duration::from_millis(100 * step);
            light
                .tick(&mut TickContext {
                    canvas: &mut canvas,
                    moment: Moment::new(now, time::OffsetDateTime::UNIX_EPOCH),
                })
                .unwrap();
            assert_eq!(canvas.lit_count(), 1);
        }
        assert!(canvas.get(0, 1).is_some_and(|c| c != Default::default()));
    }
}
