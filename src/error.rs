#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Setting up error reporting failed")]
    InstallingColorEyre(#[source] color_eyre::Report),

    #[error("Setting up logging failed")]
    SettingUpLogging(#[source] tracing::subscriber::SetGlobalDefaultError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Display(#[from] crate::display::DisplayError),

    #[error(transparent)]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    #[error("Failed to bind UDP socket")]
    UDPBind(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Failed to subscribe")]
    Subscribing(#[source] rumqttc::v5::ClientError),
}
