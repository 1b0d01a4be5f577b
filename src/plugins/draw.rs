use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;
use embedded_graphics::Pixel;

use crate::display::Canvas;
use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginError;
use crate::plugin::PluginEvent;
use crate::plugin::TickContext;

pub const NAME: &str = "draw";

/// Remote controlled pixel painting.
///
/// Understands `{"set": [x, y], "color": [r, g, b]}` (color defaults to
/// white), `{"fill": [r, g, b]}` and `{"clear": true}`. The picture survives
/// switching to another plugin and back.
#[derive(Debug, Default)]
pub struct Draw {
    picture: Canvas,
}

impl Draw {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for Draw {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_activate(&mut self, _moment: &Moment) {
        self.picture.mark_dirty();
    }

    fn tick(&mut self, cx: &mut TickContext<'_>) -> Result<(), PluginError> {
        if !self.picture.is_dirty() {
            return Ok(());
        }

        for Pixel(point, color) in self.picture.pixels() {
            cx.canvas.set(point.x as usize, point.y as usize, color);
        }
        self.picture.mark_clean();
        Ok(())
    }

    fn on_input_event(&mut self, event: &PluginEvent) {
        if event.get("clear").and_then(|v| v.as_bool()) == Some(true) {
            self.picture.blank();
        }

        if let Some(color) = event.color("fill") {
            self.picture.fill_with(color);
        }

        if let Some((x, y)) = event.point("set") {
            let color = event.color("color").unwrap_or(Rgb888::WHITE);
            self.picture.set(x, y, color);
        }

        // keep the picture in sync with the canvas even if nothing changed
        self.picture.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use embedded_graphics::pixelcolor::Rgb888;
    use embedded_graphics::prelude::RgbColor;

    use super::Draw;
    use crate::display::Canvas;
    use crate::plugin::Moment;
    use crate::plugin::Plugin;
    use crate::plugin::PluginEvent;
    use crate::plugin::TickContext;

    fn tick(draw: &mut Draw, canvas: &mut Canvas) {
        draw.tick(&mut TickContext {
            canvas,
            moment: Moment::new(Instant::now(), time::OffsetDateTime::UNIX_EPOCH),
        })
        .unwrap();
    }

    fn event(doc: &str) -> PluginEvent {
        serde_json::from_str(doc).unwrap()
    }

    #[test]
    fn paints_from_events() {
        let mut draw = Draw::new();
        let mut canvas = Canvas::new();
        draw.on_activate(&Moment::new(Instant::now(), time::OffsetDateTime::UNIX_EPOCH));

        draw.on_input_event(&event(r#"{"set": [4, 2], "color": [0, 255, 0]}"#));
        draw.on_input_event(&event(r#"{"set": [1, 1]}"#));
        tick(&mut draw, &mut canvas);

        assert_eq!(canvas.get(4, 2), Some(Rgb888::GREEN));
        assert_eq!(canvas.get(1, 1), Some(Rgb888::WHITE));
        assert_eq!(canvas.lit_count(), 2);

        draw.on_input_event(&event(r#"{"clear": true}"#));
        tick(&mut draw, &mut canvas);
        assert_eq!(canvas.lit_count(), 0);
    }

    #[test]
    fn picture_survives_a_blanked_canvas() {
        let mut draw = Draw::new();
        let mut canvas = Canvas::new();
        let moment = Moment::new(Instant::now(), time::OffsetDateTime::UNIX_EPOCH);
        draw.on_activate(&moment);
        draw.on_input_event(&event(r#"{"fill": [0, 0, 255]}"#));
        tick(&mut draw, &mut canvas);

        draw.on_deactivate();
        canvas.blank();
        draw.on_activate(&moment);
        tick(&mut draw, &mut canvas);
        assert_eq!(canvas.get(31, 15), Some(Rgb888::BLUE));
    }
}
