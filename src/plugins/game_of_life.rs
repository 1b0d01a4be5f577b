use std::time::Duration;
use std::time::Instant;

use embedded_graphics::pixelcolor::Rgb888;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::display::NUM_LEDS;
use crate::display::NUM_LEDS_X;
use crate::display::NUM_LEDS_Y;
use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginError;
use crate::plugin::PluginEvent;
use crate::plugin::TickContext;

pub const NAME: &str = "game_of_life";

const GENERATION: Duration = Duration::from_millis(150);

/// A board that stopped changing is reseeded after this many generations.
const STAGNATION_LIMIT: u32 = 20;

/// Conway's Game of Life on a torus the size of the matrix.
///
/// Any input event reseeds the board.
pub struct GameOfLife {
    rng: ChaCha8Rng,
    cells: [bool; NUM_LEDS],
    scratch: [bool; NUM_LEDS],
    history: [u64; 2],
    stagnant_for: u32,
    generation: u64,
    last_step: Option<Instant>,
}

impl GameOfLife {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            cells: [false; NUM_LEDS],
            scratch: [false; NUM_LEDS],
            history: [0; 2],
            stagnant_for: 0,
            generation: 0,
            last_step: None,
        }
    }

    fn reseed(&mut self) {
        for cell in self.cells.iter_mut() {
            *cell = self.rng.gen_bool(0.3);
        }
        self.history = [0; 2];
        self.stagnant_for = 0;
        self.generation = 0;
    }

    fn alive_neighbours(&self, x: usize, y: usize) -> usize {
        let mut alive = 0;
        for dy in [NUM_LEDS_Y - 1, 0, 1] {
            for dx in [NUM_LEDS_X - 1, 0, 1] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = (x + dx) % NUM_LEDS_X;
                let ny = (y + dy) % NUM_LEDS_Y;
                alive += usize::from(self.cells[ny * NUM_LEDS_X + nx]);
            }
        }
        alive
    }

    fn step(&mut self) {
        for y in 0..NUM_LEDS_Y {
            for x in 0..NUM_LEDS_X {
                let idx = y * NUM_LEDS_X + x;
                self.scratch[idx] = matches!(
                    (self.cells[idx], self.alive_neighbours(x, y)),
                    (true, 2) | (_, 3)
                );
            }
        }
        std::mem::swap(&mut self.cells, &mut self.scratch);
        self.generation += 1;

        // catches still lifes and period-2 oscillators
        let fingerprint = self.fingerprint();
        if self.history.contains(&fingerprint) {
            self.stagnant_for += 1;
        } else {
            self.stagnant_for = 0;
        }
        self.history = [self.history[1], fingerprint];
    }

    fn fingerprint(&self) -> u64 {
        use std::hash::Hash;
        use std::hash::Hasher;

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.cells.hash(&mut hasher);
        hasher.finish()
    }

    fn population(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

impl Plugin for GameOfLife {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, _moment: &Moment) {
        self.reseed();
        self.last_step = None;
    }

    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError> {
        if self
            .last_step
            .is_some_and(|last| cx.moment.now.saturating_duration_since(last) < GENERATION)
        {
            return Ok(());
        }
        self.last_step = Some(cx.moment.now);

        self.step();
        if self.population() == 0 || self.stagnant_for >= STAGNATION_LIMIT {
            tracing::debug!(generation = self.generation, "Board stagnated, reseeding");
            self.reseed();
        }

        let color = crate::util::hue_to_rgb((self.generation % 200) as f32 / 200.0);
        for (idx, alive) in self.cells.iter().enumerate() {
            let color = if *alive {
                crate::util::dim(color, 60)
            } else {
                Rgb888::default()
            };
            cx.canvas.set(idx % NUM_LEDS_X, idx / NUM_LEDS_X, color);
        }
        Ok(())
    }

    fn on_input_event(&mut self, event: &PluginEvent) {
        tracing::debug!(?event, "Reseeding game of life");
        self.reseed();
    }
}
