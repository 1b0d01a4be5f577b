//! Cooperative multiplexer over the registered plugins.
//!
//! Exactly one plugin is active at a time. Selection requests and plugin
//! events are parked in single-entry slots and only applied at the top of the
//! next [`Scheduler::run_active_plugin`] call, so a switch never lands in the
//! middle of a frame and lifecycle hooks never run from inside another
//! plugin's `tick`.

use std::cell::Cell;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use std::time::Instant;

use crate::display::Canvas;
use crate::plugin::Moment;
use crate::plugin::Plugin;
use crate::plugin::PluginEvent;
use crate::plugin::TickContext;

/// Consecutive panicking ticks after which a plugin is no longer ticked for
/// the rest of its session.
pub const MAX_CONSECUTIVE_PANICS: u32 = 3;

thread_local! {
    static CONTAINING: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside a plugin hook whose panic will be
/// caught and logged by the scheduler.
pub fn containing_panic() -> bool {
    CONTAINING.with(Cell::get)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    /// Initialized without any plugins. Nothing is ever rendered.
    Idle,
    Active(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    Failed,
    Panicked,
    /// Not ticked, the plugin panicked too often in this session.
    Suspended,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub plugin: usize,
    pub switched: Option<Switch>,
    pub event_delivered: bool,
    pub outcome: TickOutcome,
    pub elapsed: Duration,
    pub over_budget: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Cannot register plugin '{name}', the registry is sealed")]
    Sealed { name: &'static str },

    #[error("Scheduler already initialized")]
    AlreadyInitialized,

    #[error("Scheduler used before init()")]
    NotInitialized,
}

pub struct Scheduler {
    plugins: Vec<Box<dyn Plugin>>,
    state: State,
    pending: Option<usize>,
    pending_event: Option<(usize, PluginEvent)>,
    tick_budget: Duration,
    consecutive_panics: u32,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("plugins", &self.names().collect::<Vec<_>>())
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("tick_budget", &self.tick_budget)
            .field("consecutive_panics", &self.consecutive_panics)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(tick_budget: Duration) -> Self {
        Self {
            plugins: Vec::new(),
            state: State::Uninitialized,
            pending: None,
            pending_event: None,
            tick_budget,
            consecutive_panics: 0,
        }
    }

    /// Append a plugin and run its one-time setup. Returns its index.
    pub fn register(&mut self, mut plugin: Box<dyn Plugin>) -> Result<usize, SchedulerError> {
        let name = plugin.name();
        if self.state != State::Uninitialized {
            tracing::error!(plugin = name, "Rejecting registration after init");
            return Err(SchedulerError::Sealed { name });
        }

        guarded(name, "setup", || plugin.setup());
        self.plugins.push(plugin);
        let index = self.plugins.len() - 1;
        tracing::debug!(plugin = name, index, "Registered plugin");
        Ok(index)
    }

    /// Seal the registry and activate the first plugin, if there is one.
    pub fn init(&mut self, moment: &Moment) -> Result<(), SchedulerError> {
        if self.state != State::Uninitialized {
            return Err(SchedulerError::AlreadyInitialized);
        }

        let Some(first) = self.plugins.first_mut() else {
            tracing::warn!("No plugins registered, scheduler stays idle");
            self.state = State::Idle;
            return Ok(());
        };

        let name = first.name();
        guarded(name, "on_activate", || first.on_activate(moment));
        self.state = State::Active(0);
        tracing::info!(plugin = name, count = self.plugins.len(), "Scheduler initialized");
        Ok(())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn active(&self) -> Option<usize> {
        match self.state {
            State::Active(index) => Some(index),
            State::Uninitialized | State::Idle => None,
        }
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active().map(|index| self.plugins[index].name())
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.iter().map(|p| p.name())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.name() == name)
    }

    /// Ask for `index` to become active at the next tick boundary.
    ///
    /// Indices wrap around the registry size. A later request replaces an
    /// earlier one that has not been applied yet.
    pub fn request_activate(&mut self, index: usize) {
        match self.state {
            State::Uninitialized => {
                tracing::debug!(index, "Dropping selection request before init");
            }
            // Idle means an empty registry, there is nothing to select
            State::Idle => {
                tracing::debug!(index, "Dropping selection request, no plugins registered");
            }
            State::Active(_) => {
                let target = index % self.plugins.len();
                if let Some(replaced) = self.pending.replace(target) {
                    tracing::trace!(replaced, target, "Overwriting pending selection");
                }
                tracing::debug!(target, "Selection requested");
            }
        }
    }

    /// Ask for the plugin `delta` positions away from the active one.
    pub fn request_relative(&mut self, delta: isize) {
        if let State::Active(active) = self.state {
            let len = self.plugins.len() as isize;
            let target = (active as isize + delta).rem_euclid(len) as usize;
            self.request_activate(target);
        } else {
            tracing::debug!(delta, "Dropping relative selection, no active plugin");
        }
    }

    pub fn request_named(&mut self, name: &str) {
        match self.position(name) {
            Some(index) => self.request_activate(index),
            None => tracing::warn!(name, "Dropping selection of unknown plugin"),
        }
    }

    /// Hand `event` to the plugin that is active right now.
    ///
    /// The event is delivered at the top of the next tick, and only if that
    /// plugin is still the active one by then. Without an active plugin the
    /// event is dropped.
    pub fn forward_event(&mut self, event: PluginEvent) {
        match self.state {
            State::Active(index) => {
                if self.pending_event.replace((index, event)).is_some() {
                    tracing::trace!("Overwriting undelivered plugin event");
                }
            }
            State::Uninitialized | State::Idle => {
                tracing::debug!(?event, "Dropping plugin event, no active plugin");
            }
        }
    }

    /// Run one tick: apply a pending switch, deliver a pending event, then
    /// let exactly one plugin render.
    pub fn run_active_plugin(
        &mut self,
        canvas: &mut Canvas,
        moment: Moment,
    ) -> Result<Option<TickReport>, SchedulerError> {
        let active = match self.state {
            State::Uninitialized => return Err(SchedulerError::NotInitialized),
            State::Idle => return Ok(None),
            State::Active(index) => index,
        };

        let switched = self.apply_pending(active, canvas, &moment);
        let active = switched.map_or(active, |s| s.to);
        let event_delivered = self.deliver_event(active);

        let plugin = &mut self.plugins[active];
        let name = plugin.name();
        if self.consecutive_panics >= MAX_CONSECUTIVE_PANICS {
            return Ok(Some(TickReport {
                plugin: active,
                switched,
                event_delivered,
                outcome: TickOutcome::Suspended,
                elapsed: Duration::ZERO,
                over_budget: false,
            }));
        }

        let started = Instant::now();
        let result = guarded(name, "tick", || {
            let mut cx = TickContext {
                canvas: &mut *canvas,
                moment,
            };
            plugin.tick(&mut cx)
        });
        let elapsed = started.elapsed();

        let outcome = match result {
            Some(Ok(())) => TickOutcome::Rendered,
            Some(Err(error)) => {
                tracing::warn!(plugin = name, %error, "Plugin tick failed");
                TickOutcome::Failed
            }
            None => TickOutcome::Panicked,
        };

        if outcome == TickOutcome::Panicked {
            self.consecutive_panics += 1;
            if self.consecutive_panics >= MAX_CONSECUTIVE_PANICS {
                tracing::error!(
                    plugin = name,
                    panics = self.consecutive_panics,
                    "Suspending plugin until it is activated again"
                );
                canvas.blank();
            }
        } else {
            self.consecutive_panics = 0;
        }

        let over_budget = elapsed > self.tick_budget;
        if over_budget {
            tracing::warn!(
                plugin = name,
                ?elapsed,
                budget = ?self.tick_budget,
                "Plugin tick exceeded its time budget"
            );
        }

        Ok(Some(TickReport {
            plugin: active,
            switched,
            event_delivered,
            outcome,
            elapsed,
            over_budget,
        }))
    }

    /// End the active session, leaving the scheduler idle.
    pub fn shutdown(&mut self) {
        if let State::Active(index) = self.state {
            let plugin = &mut self.plugins[index];
            let name = plugin.name();
            guarded(name, "on_deactivate", || plugin.on_deactivate());
            tracing::info!(plugin = name, "Deactivated plugin for shutdown");
        }
        self.state = State::Idle;
        self.pending = None;
        self.pending_event = None;
        self.consecutive_panics = 0;
    }

    fn apply_pending(&mut self, active: usize, canvas: &mut Canvas, moment: &Moment) -> Option<Switch> {
        let target = self.pending.take()?;
        if target == active {
            tracing::trace!(target, "Pending selection is already active");
            return None;
        }

        let outgoing = &mut self.plugins[active];
        let from_name = outgoing.name();
        guarded(from_name, "on_deactivate", || outgoing.on_deactivate());

        canvas.blank();
        self.state = State::Active(target);
        self.consecutive_panics = 0;

        let incoming = &mut self.plugins[target];
        let to_name = incoming.name();
        guarded(to_name, "on_activate", || incoming.on_activate(moment));

        tracing::info!(from = from_name, to = to_name, "Switched active plugin");
        Some(Switch {
            from: active,
            to: target,
        })
    }

    fn deliver_event(&mut self, active: usize) -> bool {
        let Some((target, event)) = self.pending_event.take() else {
            return false;
        };

        if target != active {
            tracing::debug!(?event, "Dropping plugin event, its plugin is no longer active");
            return false;
        }

        let plugin = &mut self.plugins[active];
        guarded(plugin.name(), "on_input_event", || plugin.on_input_event(&event)).is_some()
    }
}

/// Run a plugin hook, containing any panic so it cannot take the loop down.
fn guarded<R>(plugin: &'static str, hook: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    let outer = CONTAINING.with(|containing| containing.replace(true));
    let result = std::panic::catch_unwind(AssertUnwindSafe(f));
    CONTAINING.with(|containing| containing.set(outer));

    match result {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            tracing::error!(plugin, hook, message, "Plugin panicked");
            None
        }
    }
}
