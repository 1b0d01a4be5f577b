use std::time::Instant;

use crate::config::ScheduleConfig;
use crate::config::TimeOfDay;
use crate::plugin::Moment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Activate(String),
    Next,
}

#[derive(Debug)]
struct DailyEntry {
    at: TimeOfDay,
    plugin: String,
    last_fired: Option<time::Date>,
}

/// Time based selection: daily "at HH:MM show X" entries and an optional
/// playlist rotation.
#[derive(Debug)]
pub struct Schedule {
    daily: Vec<DailyEntry>,
    rotate_every: Option<std::time::Duration>,
    rotation_anchor: Option<Instant>,
}

impl Schedule {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            daily: config
                .daily
                .iter()
                .map(|entry| DailyEntry {
                    at: entry.at,
                    plugin: entry.plugin.clone(),
                    last_fired: None,
                })
                .collect(),
            rotate_every: config.rotate_every,
            rotation_anchor: None,
        }
    }

    /// Restart the rotation countdown, e.g. after a manual selection.
    pub fn postpone_rotation(&mut self, now: Instant) {
        if self.rotate_every.is_some() {
            self.rotation_anchor = Some(now);
        }
    }

    pub fn poll(&mut self, moment: &Moment) -> Option<Trigger> {
        let today = moment.local.date();
        let (hour, minute) = (moment.local.hour(), moment.local.minute());

        for entry in self.daily.iter_mut() {
            if entry.at.hour == hour
                && entry.at.minute == minute
                && entry.last_fired != Some(today)
            {
                entry.last_fired = Some(today);
                tracing::info!(plugin = %entry.plugin, at = %entry.at, "Scheduled selection due");
                self.rotation_anchor = Some(moment.now);
                return Some(Trigger::Activate(entry.plugin.clone()));
            }
        }

        let every = self.rotate_every?;
        let anchor = *self.rotation_anchor.get_or_insert(moment.now);
        if moment.now.saturating_duration_since(anchor) >= every {
            self.rotation_anchor = Some(moment.now);
            tracing::debug!(?every, "Rotating to next plugin");
            return Some(Trigger::Next);
        }

        None
    }
}
