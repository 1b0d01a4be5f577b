//! Normalizes raw inputs into scheduler requests.
//!
//! Three sources feed the router: the debounced physical button, remote
//! events and the time based schedule. None of them is buffered here; every
//! selection lands in the scheduler's single pending slot and the latest one
//! wins.

use std::time::Duration;
use std::time::Instant;

use crate::event::EventInner;
use crate::plugin::Moment;
use crate::plugin::PluginEvent;
use crate::scheduler::Scheduler;

pub mod button;
pub mod schedule;

use self::button::ButtonEdge;
use self::button::Debouncer;
use self::schedule::Schedule;
use self::schedule::Trigger;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Activate(usize),
    ActivateNamed(String),
    Next,
    Previous,
    Event(PluginEvent),
}

/// Remote requests that concern the sign itself rather than a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    SetBrightness(u8),
    ShowText { text: String, repeat: Option<u32> },
    Power(bool),
}

#[derive(Debug)]
pub struct InputRouter {
    debouncer: Debouncer,
    schedule: Schedule,
}

impl InputRouter {
    pub fn new(debounce: Duration, schedule: Schedule) -> Self {
        Self {
            debouncer: Debouncer::new(debounce),
            schedule,
        }
    }

    /// Feed the current raw button level. A debounced press selects the next
    /// plugin.
    pub fn poll_button(&mut self, pressed: bool, now: Instant, scheduler: &mut Scheduler) {
        if let Some(ButtonEdge::Pressed) = self.debouncer.update(pressed, now) {
            tracing::info!("Button pressed, selecting next plugin");
            self.apply(Command::Next, now, scheduler);
        }
    }

    pub fn poll_schedule(&mut self, moment: &Moment, scheduler: &mut Scheduler) {
        match self.schedule.poll(moment) {
            Some(Trigger::Activate(name)) => scheduler.request_named(&name),
            Some(Trigger::Next) => scheduler.request_relative(1),
            None => {}
        }
    }

    /// Route one remote event, returning what the sign itself has to do.
    pub fn route_remote(
        &mut self,
        event: EventInner,
        now: Instant,
        scheduler: &mut Scheduler,
    ) -> Option<Directive> {
        let command = match event {
            EventInner::TurnOn => return Some(Directive::Power(true)),
            EventInner::TurnOff => return Some(Directive::Power(false)),
            EventInner::SetBrightness(brightness) => {
                return Some(Directive::SetBrightness(brightness))
            }
            EventInner::ShowText { text, repeat } => {
                return Some(Directive::ShowText { text, repeat })
            }
            EventInner::ActivatePlugin(index) => Command::Activate(index),
            EventInner::ActivatePluginNamed(name) => Command::ActivateNamed(name),
            EventInner::NextPlugin => Command::Next,
            EventInner::PreviousPlugin => Command::Previous,
            EventInner::PluginEvent(payload) => Command::Event(payload),
        };

        self.apply(command, now, scheduler);
        None
    }

    pub fn apply(&mut self, command: Command, now: Instant, scheduler: &mut Scheduler) {
        tracing::debug!(?command, "Applying input command");
        match command {
            Command::Activate(index) => scheduler.request_activate(index),
            Command::ActivateNamed(name) => scheduler.request_named(&name),
            Command::Next => scheduler.request_relative(1),
            Command::Previous => scheduler.request_relative(-1),
            Command::Event(payload) => {
                scheduler.forward_event(payload);
                return;
            }
        }
        self.schedule.postpone_rotation(now);
    }
}
