//! UTC offset for wall-clock time, following the system's timezone rules
//! across daylight-saving changes.

use std::time::Duration;
use std::time::Instant;

/// How long a looked-up system offset is reused before asking again.
pub const REFRESH: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum LocalOffset {
    Fixed(time::UtcOffset),
    System {
        current: time::UtcOffset,
        refreshed: Option<Instant>,
    },
}

impl LocalOffset {
    pub fn system() -> Self {
        Self::System {
            current: time::UtcOffset::UTC,
            refreshed: None,
        }
    }

    /// Offset in effect at `now`.
    pub fn at(&mut self, now: Instant) -> time::UtcOffset {
        self.at_with(now, system_offset)
    }

    fn at_with(
        &mut self,
        now: Instant,
        lookup: impl FnOnce() -> Option<time::UtcOffset>,
    ) -> time::UtcOffset {
        let (current, refreshed) = match self {
            Self::Fixed(offset) => return *offset,
            Self::System { current, refreshed } => (current, refreshed),
        };

        let stale = refreshed.map_or(true, |last| now.saturating_duration_since(last) >= REFRESH);
        if !stale {
            return *current;
        }

        let first = refreshed.is_none();
        *refreshed = Some(now);
        match lookup() {
            Some(offset) if first => {
                tracing::debug!(?offset, "Using system UTC offset");
                *current = offset;
            }
            Some(offset) if offset != *current => {
                tracing::info!(from = ?*current, to = ?offset, "Local UTC offset changed");
                *current = offset;
            }
            Some(_) => {}
            None => {
                tracing::warn!(offset = ?*current, "Cannot determine local UTC offset, keeping the last one");
            }
        }
        *current
    }
}

fn system_offset() -> Option<time::UtcOffset> {
    let seconds = chrono::Local::now().offset().local_minus_utc();
    time::UtcOffset::from_whole_seconds(seconds).ok()
}
