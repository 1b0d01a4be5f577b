use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about = "Drive an LED matrix sign with swappable visual plugins")]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Path of the configuration file
    #[clap(long, short)]
    pub config: Option<camino::Utf8PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Run the sign
    Run,

    /// Load the configuration and build the plugin set, without touching hardware
    VerifyConfig,

    /// Print the names of all bundled plugins
    ListPlugins,
}
