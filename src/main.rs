use std::time::Duration;
use std::time::Instant;

mod ambient;
mod cli;
mod config;
mod display;
mod driver;
mod error;
mod event;
mod input;
mod localtime;
mod logging;
mod mqtt;
mod plugin;
mod plugins;
mod scheduler;
mod systemd;
mod util;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::eyre::Result<()> {
    setup_panic();
    color_eyre::install().map_err(crate::error::Error::InstallingColorEyre)?;
    let cli = <crate::cli::Cli as clap::Parser>::parse();
    crate::logging::setup(cli.verbosity)?;

    match cli.command {
        cli::Command::Run => {
            let cfg = load_config(cli.config.as_deref()).await?;
            run(cfg).await?;
        }
        cli::Command::VerifyConfig => {
            let cfg = load_config(cli.config.as_deref()).await?;
            let scheduler = crate::plugins::scheduler_for(&cfg)?;
            tracing::info!(plugins = ?scheduler, "Configuration verified");
        }
        cli::Command::ListPlugins => {
            for name in crate::plugins::NAMES {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn setup_panic() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
    .authors("Matthias Beyer <mail@beyermatthias.de>"));

    // plugin panics are caught and logged by the scheduler, no crash report
    let report = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if !crate::scheduler::containing_panic() {
            report(info);
        }
    }));
}

async fn load_config(
    path: Option<&camino::Utf8Path>,
) -> Result<crate::config::Config, crate::config::ConfigError> {
    let path = path.ok_or(crate::config::ConfigError::NoConfigFile)?;
    crate::config::Config::load(path).await
}

async fn run(config: crate::config::Config) -> Result<(), crate::error::Error> {
    let process_state = systemd::ProcessState {
        span: tracing::info_span!("ledsign"),
    };
    process_state.set_starting();

    let mut offset = config.time.local_offset();
    let scheduler = crate::plugins::scheduler_for(&config)?;
    let plugin_count = scheduler.len();
    let sink = crate::display::ddp::DdpSink::connect(&config.display)?;

    let router = crate::input::InputRouter::new(
        config
            .button
            .as_ref()
            .map(|button| button.debounce)
            .unwrap_or_default(),
        crate::input::schedule::Schedule::new(&config.schedule),
    );
    let overlay =
        crate::ambient::messages::MessageOverlay::new(&config.messages, config.display.font.into());
    let dim = crate::ambient::dim::DimMode::new(config.display.initial_brightness, config.dim.clone());

    let mut sign = crate::driver::Sign::new(scheduler, router, overlay, dim, sink);
    sign.init(&crate::plugin::Moment::capture(&mut offset))?;

    let (event_sender, mut event_receiver) = tokio::sync::mpsc::channel::<event::Event>(100);
    let (status_sender, status_receiver) = tokio::sync::watch::channel(sign.active_plugin_name());
    let (level_sender, level_receiver) = tokio::sync::watch::channel(false);
    let cancellation_token = tokio_util::sync::CancellationToken::new();

    if let Some(mqtt_config) = config.mqtt.clone() {
        tokio::task::spawn({
            let cancellation_token = cancellation_token.clone();
            async move {
                if let Err(error) =
                    mqtt::run(mqtt_config, cancellation_token, event_sender, status_receiver).await
                {
                    tracing::error!(?error, "MQTT processing failed");
                }
            }
        });
    } else {
        tracing::info!("No MQTT broker configured, remote control disabled");
    }

    let button_enabled = config.button.is_some();
    if let Some(button_config) = config.button.clone() {
        tokio::task::spawn(crate::input::button::watch_line(
            button_config,
            cancellation_token.clone(),
            level_sender,
        ));
    }

    let mut tick_interval = tokio::time::interval(config.scheduler.tick_interval);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut watchdog_interval = tokio::time::interval(Duration::from_secs(1));
    let mut remote_open = true;

    process_state.set_running(plugin_count);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let moment = crate::plugin::Moment::capture(&mut offset);
                let button = button_enabled.then(|| *level_receiver.borrow());

                if let Some(crate::scheduler::TickReport {
                    plugin,
                    switched,
                    event_delivered,
                    outcome,
                    elapsed,
                    over_budget,
                }) = sign.tick(moment, button)
                {
                    if let Some(crate::scheduler::Switch { from, to }) = switched {
                        tracing::debug!(from, to, "Switched plugin");
                    }
                    tracing::trace!(plugin, event_delivered, ?outcome, ?elapsed, over_budget, "Tick done");
                }

                status_sender.send_if_modified(|current| {
                    let active = sign.active_plugin_name();
                    let changed = *current != active;
                    *current = active;
                    changed
                });
            }

            event = event_receiver.recv(), if remote_open => {
                let Some(event) = event else {
                    tracing::warn!("Remote event channel closed, continuing without remote control");
                    remote_open = false;
                    continue;
                };

                tracing::info!(?event, "Handling remote event");
                sign.handle_remote(event.event, Instant::now());
            }

            _ = watchdog_interval.tick() => {
                process_state.ping_watchdog();
            }

            _ctrl_c = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down");
                cancellation_token.cancel();
                break
            }
        }
    }

    sign.shutdown();
    process_state.set_finished();
    Ok(())
}
