use std::time::Duration;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed,
    Released,
}

/// Turns a bouncing raw level into clean press/release edges.
///
/// A level change is only accepted once the raw input kept that level for at
/// least `min_stable`.
#[derive(Debug)]
pub struct Debouncer {
    min_stable: Duration,
    stable: bool,
    raw: bool,
    raw_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(min_stable: Duration) -> Self {
        Self {
            min_stable,
            stable: false,
            raw: false,
            raw_since: None,
        }
    }

    #[cfg(test)]
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<ButtonEdge> {
        if pressed != self.raw || self.raw_since.is_none() {
            self.raw = pressed;
            self.raw_since = Some(now);
        }

        let since = self.raw_since?;
        if self.raw == self.stable || now.saturating_duration_since(since) < self.min_stable {
            return None;
        }

        self.stable = self.raw;
        let edge = if self.stable {
            ButtonEdge::Pressed
        } else {
            ButtonEdge::Released
        };
        tracing::debug!(?edge, "Button edge");
        Some(edge)
    }
}

/// Poll a GPIO value file and publish the raw button level.
///
/// The file holds `0` or `1`, like `/sys/class/gpio/gpioN/value`. The main
/// loop only ever looks at the latest published level.
pub async fn watch_line(
    config: crate::config::ButtonConfig,
    cancellation_token: CancellationToken,
    level: tokio::sync::watch::Sender<bool>,
) {
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_error_logged = false;

    loop {
        let Some(_tick) = cancellation_token
            .run_until_cancelled(interval.tick())
            .await
        else {
            tracing::info!("Cancelled, stopping button watcher");
            break;
        };

        match tokio::fs::read_to_string(&config.path).await {
            Ok(content) => {
                last_error_logged = false;
                let Some(pressed) = parse_level(&content, config.active_low) else {
                    tracing::trace!(?content, "Ignoring unreadable GPIO value");
                    continue;
                };
                level.send_if_modified(|current| {
                    let changed = *current != pressed;
                    *current = pressed;
                    changed
                });
            }
            Err(error) => {
                if !last_error_logged {
                    tracing::warn!(path = %config.path, ?error, "Failed to read button line");
                    last_error_logged = true;
                }
            }
        }
    }
}

fn parse_level(content: &str, active_low: bool) -> Option<bool> {
    let high = match content.trim() {
        "1" => true,
        "0" => false,
        _ => return None,
    };
    Some(high != active_low)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use super::parse_level;
    use super::ButtonEdge;
    use super::Debouncer;

    const STABLE: Duration = Duration::from_millis(50);

    #[test]
    fn short_press_produces_nothing() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(STABLE);
        assert_eq!(debouncer.update(true, t0), None);
        assert_eq!(debouncer.update(true, t0 + Duration::from_millis(49)), None);
        assert_eq!(debouncer.update(false, t0 + Duration::from_millis(49)), None);
        assert_eq!(debouncer.update(false, t0 + Duration::from_millis(500)), None);
        assert!(!debouncer.is_pressed());
    }

    #[test]
    fn stable_press_fires_once() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(STABLE);
        assert_eq!(debouncer.update(true, t0), None);
        assert_eq!(
            debouncer.update(true, t0 + STABLE),
            Some(ButtonEdge::Pressed)
        );
        assert_eq!(debouncer.update(true, t0 + STABLE * 4), None);

        let release = t0 + STABLE * 5;
        assert_eq!(debouncer.update(false, release), None);
        assert_eq!(
            debouncer.update(false, release + STABLE),
            Some(ButtonEdge::Released)
        );
    }

    #[test]
    fn bouncing_contact_restarts_the_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(STABLE);
        let mut edges = Vec::new();
        for step in 0..10u32 {
            let now = t0 + Duration::from_millis(10) * step;
            edges.extend(debouncer.update(step % 2 == 0, now));
        }
        assert!(edges.is_empty());

        let settled = t0 + Duration::from_millis(100);
        edges.extend(debouncer.update(true, settled));
        edges.extend(debouncer.update(true, settled + STABLE));
        assert_eq!(edges, [ButtonEdge::Pressed]);
    }

    #[test]
    fn parses_gpio_levels() {
        assert_eq!(parse_level("1\n", false), Some(true));
        assert_eq!(parse_level("0\n", true), Some(true));
        assert_eq!(parse_level("1", true), Some(false));
        assert_eq!(parse_level("x", false), None);
    }
}
