use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::OriginDimensions;
use embedded_graphics::prelude::Point;
use embedded_graphics::prelude::RgbColor;
use embedded_graphics::prelude::Size;
use embedded_graphics::Pixel;

pub mod ddp;

pub const NUM_LEDS_X: usize = 32;

pub const NUM_LEDS_Y: usize = 16;

pub const NUM_LEDS: usize = NUM_LEDS_X * NUM_LEDS_Y;

/// In-memory frame for the whole matrix.
///
/// Plugins draw into a `Canvas` through the `embedded_graphics` `DrawTarget`
/// implementation or through [`Canvas::set`]. The canvas remembers whether it
/// changed since the last commit, so the driver only pushes frames that
/// differ.
#[derive(Clone)]
pub struct Canvas {
    buf: [Rgb888; NUM_LEDS],
    dirty: bool,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("lit", &self.lit_count())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            buf: [Rgb888::BLACK; NUM_LEDS],
            dirty: true,
        }
    }

    #[inline]
    fn index(x: usize, y: usize) -> Option<usize> {
        (x < NUM_LEDS_X && y < NUM_LEDS_Y).then_some(y * NUM_LEDS_X + x)
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb888> {
        Self::index(x, y).map(|idx| self.buf[idx])
    }

    /// Set one pixel, silently ignoring coordinates outside of the matrix.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Rgb888) {
        if let Some(idx) = Self::index(x, y) {
            if self.buf[idx] != color {
                self.buf[idx] = color;
                self.dirty = true;
            }
        }
    }

    pub fn blank(&mut self) {
        self.fill_with(Rgb888::BLACK);
    }

    pub fn fill_with(&mut self, color: Rgb888) {
        if self.buf.iter().any(|c| *c != color) {
            self.buf = [color; NUM_LEDS];
            self.dirty = true;
        }
    }

    /// Fade every pixel towards black by `amount` per channel.
    pub fn fade(&mut self, amount: u8) {
        for c in self.buf.iter_mut() {
            let faded = Rgb888::new(
                c.r().saturating_sub(amount),
                c.g().saturating_sub(amount),
                c.b().saturating_sub(amount),
            );
            if faded != *c {
                *c = faded;
                self.dirty = true;
            }
        }
    }

    /// Draw an `embedded_graphics` item, clipped to the matrix.
    pub fn render<D>(&mut self, drawable: &D)
    where
        D: embedded_graphics::Drawable<Color = Rgb888>,
    {
        match drawable.draw(self) {
            Ok(_) => {}
            Err(never) => match never {},
        }
    }

    pub fn lit_count(&self) -> usize {
        self.buf.iter().filter(|c| **c != Rgb888::BLACK).count()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn pixels(&self) -> impl Iterator<Item = Pixel<Rgb888>> + '_ {
        self.buf.iter().enumerate().map(|(idx, color)| {
            let x = (idx % NUM_LEDS_X) as i32;
            let y = (idx / NUM_LEDS_X) as i32;
            Pixel(Point::new(x, y), *color)
        })
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(NUM_LEDS_X as u32, NUM_LEDS_Y as u32)
    }
}

impl embedded_graphics::prelude::DrawTarget for Canvas {
    type Color = Rgb888;

    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set(point.x as usize, point.y as usize, color);
        }
        Ok(())
    }
}

/// Where finished frames go.
pub trait FrameSink {
    fn commit(&mut self, frame: &Canvas) -> Result<(), DisplayError>;

    fn set_brightness(&mut self, brightness: u8);
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("Failed to draw frame into matrix buffer")]
    Draw,

    #[error("DDP error")]
    Ddp(#[from] ddp_rs::error::DDPError),
}
