use clap::{Parser, Subcommand};
use quorum::Principal;

pub mod config;
pub mod context;
pub mod deposit;
pub mod init;
pub mod proposal;
pub mod show;
pub mod status;
pub mod version;

#[derive(Parser)]
#[command(name = "quorum")]
#[command(author = "Quorum Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Quorum multi-owner custody ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the config file and initialize the ledger store
    Init {
        /// Owner principal (repeat for each owner, in order)
        #[arg(long = "owner", required = true)]
        owners: Vec<Principal>,

        /// Distinct confirmations required to execute
        #[arg(long)]
        threshold: usize,

        /// Path to config file (default: ~/.local/share/quorum/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to the ledger database (default: adjacent to the config)
        #[arg(long)]
        store_path: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force_config: bool,
    },

    /// Show owners, balance and proposal statuses
    Status {
        #[arg(long)]
        config: Option<String>,
    },

    /// Credit the pool (open to any sender)
    Deposit {
        #[arg(long)]
        config: Option<String>,

        /// Sending principal
        #[arg(long)]
        from: Principal,

        #[arg(long)]
        amount: u128,
    },

    /// Submit a new proposal
    Submit {
        #[arg(long)]
        config: Option<String>,

        /// Calling owner
        #[arg(long = "as", value_name = "OWNER")]
        caller: Principal,

        /// Call target
        #[arg(long = "to", value_name = "TARGET")]
        target: Principal,

        /// Value transferred with the call
        #[arg(long, default_value_t = 0)]
        value: u128,

        /// Call payload as hex
        #[arg(long)]
        payload: Option<String>,
    },

    /// Confirm a proposal
    Confirm {
        #[arg(long)]
        config: Option<String>,

        #[arg(long = "as", value_name = "OWNER")]
        caller: Principal,

        #[arg(long)]
        index: u64,
    },

    /// Withdraw a confirmation
    Revoke {
        #[arg(long)]
        config: Option<String>,

        #[arg(long = "as", value_name = "OWNER")]
        caller: Principal,

        #[arg(long)]
        index: u64,
    },

    /// Dispatch an approved proposal
    Execute {
        #[arg(long)]
        config: Option<String>,

        #[arg(long = "as", value_name = "OWNER")]
        caller: Principal,

        #[arg(long)]
        index: u64,
    },

    /// Print one proposal as JSON
    Show {
        #[arg(long)]
        config: Option<String>,

        #[arg(long)]
        index: u64,
    },

    /// Print the record log
    Records {
        #[arg(long)]
        config: Option<String>,

        /// Only the most recent N records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Init {
            owners,
            threshold,
            config,
            store_path,
            force_config,
        } => init::execute(owners, threshold, config, store_path, force_config).await,
        Commands::Status { config } => status::execute(config).await,
        Commands::Deposit {
            config,
            from,
            amount,
        } => deposit::execute(config, from, amount).await,
        Commands::Submit {
            config,
            caller,
            target,
            value,
            payload,
        } => proposal::submit(config, caller, target, value, payload).await,
        Commands::Confirm {
            config,
            caller,
            index,
        } => proposal::confirm(config, caller, index).await,
        Commands::Revoke {
            config,
            caller,
            index,
        } => proposal::revoke(config, caller, index).await,
        Commands::Execute {
            config,
            caller,
            index,
        } => proposal::execute(config, caller, index).await,
        Commands::Show { config, index } => show::proposal(config, index).await,
        Commands::Records { config, limit } => show::records(config, limit).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
