//! Command line arguments of the deployer binary.

use {std::path::PathBuf, tracing::level_filters::LevelFilter};

#[derive(Debug, clap::Parser)]
pub struct Arguments {
    #[clap(long, env, default_value = "info")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// Path to the TOML session configuration.
    #[clap(long, env, default_value = "deployer.toml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Deploy a contract that takes no constructor arguments, linking it
    /// against already deployed libraries first if any are given.
    Deploy {
        name: String,

        /// Source file name, when it differs from `<name>.sol`.
        #[clap(long)]
        file: Option<String>,

        /// Library names to link against, in deployment order.
        #[clap(long, use_value_delimiter = true)]
        libraries: Vec<String>,
    },

    /// Send raw hex calldata to a deployed contract.
    Send {
        name: String,
        data: String,

        /// Value to transfer in wei.
        #[clap(long, default_value_t = 0)]
        value: u64,
    },

    /// Bind a name to an already deployed contract, recording the address
    /// when one is supplied.
    Attach {
        name: String,
        address: Option<String>,
    },
}
