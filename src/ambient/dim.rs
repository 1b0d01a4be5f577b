use std::time::Instant;

use crate::config::DimConfig;
use crate::plugin::Moment;

pub const MIN_BRIGHTNESS: u8 = 5;
pub const MAX_BRIGHTNESS: u8 = 100;

/// Switches the matrix between day and night brightness.
#[derive(Debug)]
pub struct DimMode {
    policy: Option<DimConfig>,
    day_brightness: u8,
    applied: Option<u8>,
    last_check: Option<Instant>,
}

impl DimMode {
    pub fn new(initial_brightness: u8, policy: Option<DimConfig>) -> Self {
        Self {
            policy,
            day_brightness: initial_brightness.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS),
            applied: Some(initial_brightness),
            last_check: None,
        }
    }

    /// Brightness outside of the night window, e.g. after a remote request.
    pub fn set_day_brightness(&mut self, brightness: u8) {
        self.day_brightness = brightness.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS);
        self.applied = None;
        self.last_check = None;
    }

    #[cfg(test)]
    pub fn day_brightness(&self) -> u8 {
        self.day_brightness
    }

    /// Returns the brightness to apply if it changed since the last call.
    pub fn check(&mut self, moment: &Moment) -> Option<u8> {
        let interval = self.policy.as_ref().map(|p| p.check_interval);
        if let (Some(last), Some(interval)) = (self.last_check, interval) {
            if moment.now.saturating_duration_since(last) < interval {
                return None;
            }
        }
        self.last_check = Some(moment.now);

        let wanted = self.wanted(moment);
        if self.applied == Some(wanted) {
            return None;
        }

        tracing::debug!(brightness = wanted, "Changing brightness");
        self.applied = Some(wanted);
        Some(wanted)
    }

    fn wanted(&self, moment: &Moment) -> u8 {
        let Some(policy) = self.policy.as_ref() else {
            return self.day_brightness;
        };

        let minute = u16::from(moment.local.hour()) * 60 + u16::from(moment.local.minute());
        let start = policy.night_start.minutes_since_midnight();
        let end = policy.night_end.minutes_since_midnight();

        let night = if start <= end {
            minute >= start && minute < end
        } else {
            minute >= start || minute < end
        };

        if night {
            policy.night_brightness.min(MAX_BRIGHTNESS)
        } else {
            self.day_brightness
        }
    }
}
