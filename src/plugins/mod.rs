//! The visual programs that ship with the sign.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::config::ConfigError;
use crate::config::PluginsConfig;
use crate::plugin::Plugin;
use crate::scheduler::Scheduler;

pub mod clock;
pub mod draw;
pub mod game_of_life;
pub mod rain;
pub mod running_light;
pub mod stars;
pub mod stopwatch;

/// Names of all bundled plugins, in their default order.
pub const NAMES: &[&str] = &[
    clock::NAME,
    stopwatch::NAME,
    running_light::NAME,
    stars::NAME,
    rain::NAME,
    game_of_life::NAME,
    draw::NAME,
];

/// Construct the plugin called `name`.
pub fn build(
    name: &str,
    config: &PluginsConfig,
    rng: ChaCha8Rng,
) -> Result<Box<dyn Plugin>, ConfigError> {
    let plugin: Box<dyn Plugin> = match name {
        clock::NAME => Box::new(clock::Clock::new(&config.clock)),
        stopwatch::NAME => Box::new(stopwatch::Stopwatch::new()),
        running_light::NAME => Box::new(running_light::RunningLight::new()),
        stars::NAME => Box::new(stars::Stars::new(rng)),
        rain::NAME => Box::new(rain::Rain::new(rng)),
        game_of_life::NAME => Box::new(game_of_life::GameOfLife::new(rng)),
        draw::NAME => Box::new(draw::Draw::new()),
        other => return Err(ConfigError::UnknownPlugin(other.to_string())),
    };
    Ok(plugin)
}

/// Build every configured plugin, checking all names before constructing
/// anything.
pub fn build_all(config: &PluginsConfig) -> Result<Vec<Box<dyn Plugin>>, ConfigError> {
    let order: Vec<&str> = match config.order.as_ref() {
        Some(order) => order.iter().map(String::as_str).collect(),
        None => NAMES.to_vec(),
    };

    if let Some(unknown) = order.iter().find(|name| !NAMES.contains(name)) {
        return Err(ConfigError::UnknownPlugin(unknown.to_string()));
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::debug!(seed, "Seeding generative plugins");

    order
        .into_iter()
        .enumerate()
        .map(|(idx, name)| build(name, config, ChaCha8Rng::seed_from_u64(seed.wrapping_add(idx as u64))))
        .collect()
}

/// Scheduler with every configured plugin registered, not yet initialized.
///
/// Plugins named by the daily schedule have to be part of the registry.
pub fn scheduler_for(config: &Config) -> Result<Scheduler, crate::error::Error> {
    let mut scheduler = Scheduler::new(config.scheduler.tick_budget);
    for plugin in build_all(&config.plugins)? {
        scheduler.register(plugin)?;
    }

    if let Some(entry) = config
        .schedule
        .daily
        .iter()
        .find(|entry| scheduler.position(&entry.plugin).is_none())
    {
        return Err(ConfigError::UnknownPlugin(entry.plugin.clone()).into());
    }

    Ok(scheduler)
}
