//! One tick of the sign: inputs, ambient services, the active plugin, and
//! the frame that ends up on the matrix.

use std::time::Instant;

use crate::ambient::dim::DimMode;
use crate::ambient::messages::MessageOverlay;
use crate::display::Canvas;
use crate::display::FrameSink;
use crate::event::EventInner;
use crate::input::Directive;
use crate::input::InputRouter;
use crate::plugin::Moment;
use crate::scheduler::Scheduler;
use crate::scheduler::TickReport;

pub struct Sign<S: FrameSink> {
    scheduler: Scheduler,
    router: InputRouter,
    overlay: MessageOverlay,
    dim: DimMode,
    sink: S,
    canvas: Canvas,
    blank: Canvas,
    powered: bool,
    overlay_was_showing: bool,
}

impl<S: FrameSink> Sign<S> {
    pub fn new(
        scheduler: Scheduler,
        router: InputRouter,
        overlay: MessageOverlay,
        dim: DimMode,
        sink: S,
    ) -> Self {
        Self {
            scheduler,
            router,
            overlay,
            dim,
            sink,
            canvas: Canvas::new(),
            blank: Canvas::new(),
            powered: true,
            overlay_was_showing: false,
        }
    }

    pub fn init(&mut self, moment: &Moment) -> Result<(), crate::scheduler::SchedulerError> {
        self.scheduler.init(moment)?;
        tracing::debug!(state = ?self.scheduler.state(), "Sign initialized");
        Ok(())
    }

    pub fn active_plugin_name(&self) -> Option<&'static str> {
        self.scheduler.active_name()
    }

    /// Run one loop iteration with the latest raw button level.
    pub fn tick(&mut self, moment: Moment, button_pressed: Option<bool>) -> Option<TickReport> {
        if let Some(pressed) = button_pressed {
            self.router
                .poll_button(pressed, moment.now, &mut self.scheduler);
        }
        self.router.poll_schedule(&moment, &mut self.scheduler);

        let overlay_showing = self.overlay.update(moment.now);
        if let Some(brightness) = self.dim.check(&moment) {
            self.sink.set_brightness(brightness);
            self.canvas.mark_dirty();
            self.overlay.canvas_mut().mark_dirty();
        }

        let report = match self.scheduler.run_active_plugin(&mut self.canvas, moment) {
            Ok(report) => report,
            Err(error) => {
                tracing::error!(%error, "Failed to run active plugin");
                None
            }
        };

        self.compose(overlay_showing);
        report
    }

    fn compose(&mut self, overlay_showing: bool) {
        if !self.powered {
            if self.blank.is_dirty() {
                Self::commit(&mut self.sink, &mut self.blank);
            }
            return;
        }

        if overlay_showing {
            if self.overlay.canvas().is_dirty() {
                Self::commit(&mut self.sink, self.overlay.canvas_mut());
            }
        } else {
            if self.overlay_was_showing {
                self.canvas.mark_dirty();
            }
            if self.canvas.is_dirty() {
                Self::commit(&mut self.sink, &mut self.canvas);
            }
        }
        self.overlay_was_showing = overlay_showing;
    }

    fn commit(sink: &mut S, frame: &mut Canvas) {
        match sink.commit(frame) {
            Ok(()) => frame.mark_clean(),
            Err(error) => tracing::warn!(%error, "Failed to commit frame"),
        }
    }

    /// Apply one remote event.
    pub fn handle_remote(&mut self, event: EventInner, now: Instant) {
        let Some(directive) = self.router.route_remote(event, now, &mut self.scheduler) else {
            return;
        };

        match directive {
            Directive::SetBrightness(brightness) => {
                tracing::info!(?brightness, "Setting brightness");
                self.dim.set_day_brightness(brightness);
            }
            Directive::ShowText { text, repeat } => {
                self.overlay.show_now(text, repeat);
            }
            Directive::Power(on) => {
                tracing::info!(on, "Switching sign power");
                self.powered = on;
                self.blank.mark_dirty();
                self.canvas.mark_dirty();
                self.overlay.canvas_mut().mark_dirty();
            }
        }
    }

    /// Deactivate the active plugin and blank the matrix.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.blank.mark_dirty();
        Self::commit(&mut self.sink, &mut self.blank);
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
