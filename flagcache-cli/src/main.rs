mod remote;
mod server;

use clap::{Parser, Subcommand};
use flagcache_lib::FlagRequest;
use tracing_subscriber::EnvFilter;

use crate::server::config::{parse_storage, StorageBackend};
use crate::server::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "flagcache")]
#[command(version = "0.1.0")]
#[command(about = "Cached feature flag evaluation server and admin CLI", long_about = None)]
struct Args {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

/// Options shared by every command that talks to a running server.
#[derive(clap::Args, Debug)]
struct RemoteArgs {
    /// Server URL (e.g. http://localhost:8080)
    #[arg(short = 'r', long = "remote", env = "FLAGCACHE_REMOTE")]
    remote: Option<String>,

    /// Path to config file
    #[arg(short = 'c', long = "config", default_value = "flagcache.toml")]
    config: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the evaluation and administration server
    Serve {
        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "flagcache.toml")]
        config: String,

        /// Port to listen on
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,

        /// Address to bind
        #[arg(long = "hostname")]
        hostname: Option<String>,

        /// Flag storage backend (sled or memory)
        #[arg(short = 's', long = "storage", value_parser = parse_storage_arg)]
        storage: Option<StorageBackend>,
    },
    /// Evaluate a flag through the caching client
    Eval {
        /// Flag key to evaluate
        key: String,

        /// Target identifier forwarded as targetId
        #[arg(short = 't', long = "target")]
        target: Option<String>,

        /// Value returned when the server cannot answer (true or false)
        #[arg(short = 'd', long = "default", action = clap::ArgAction::Set, default_value_t = false)]
        default: bool,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// List all flags
    List {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Show a single flag
    Get {
        key: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Create or replace a flag
    Create {
        key: String,

        /// Create the flag switched on
        #[arg(short = 'e', long = "enabled")]
        enabled: bool,

        /// Opaque configuration payload stored with the flag
        #[arg(long = "config-payload")]
        config_payload: Option<String>,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Update an existing flag
    Update {
        key: String,

        /// New enabled state
        #[arg(short = 'e', long = "enabled", action = clap::ArgAction::Set)]
        enabled: bool,

        /// Opaque configuration payload stored with the flag
        #[arg(long = "config-payload")]
        config_payload: Option<String>,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Delete a flag
    Delete {
        key: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
}

fn parse_storage_arg(value: &str) -> Result<StorageBackend, String> {
    parse_storage(value).ok_or_else(|| format!("unknown storage backend '{}'", value))
}

fn flag_request(key: String, enabled: bool, config_payload: Option<String>) -> FlagRequest {
    FlagRequest {
        key,
        enabled,
        config: config_payload,
    }
}

#[tokio::main]
async fn main() {
    let cli = Args::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.cmd {
        Command::Serve {
            config,
            port,
            hostname,
            storage,
        } => {
            server::run_serve(ServeArgs {
                config_path: config,
                port,
                hostname,
                storage,
            })
            .await
        }
        Command::Eval {
            key,
            target,
            default,
            remote,
        } => {
            let config = remote::load_remote_config(&remote.config);
            let url = remote::resolve_remote_url(remote.remote.as_deref(), &config);
            remote::run_eval(config, url, key, target, default).await
        }
        Command::List { remote } => {
            let url = resolve(&remote);
            remote::run_list(&url).await
        }
        Command::Get { key, remote } => {
            let url = resolve(&remote);
            remote::run_get(&url, &key).await
        }
        Command::Create {
            key,
            enabled,
            config_payload,
            remote,
        } => {
            let url = resolve(&remote);
            remote::run_create(&url, flag_request(key, enabled, config_payload)).await
        }
        Command::Update {
            key,
            enabled,
            config_payload,
            remote,
        } => {
            let url = resolve(&remote);
            remote::run_update(&url, flag_request(key, enabled, config_payload)).await
        }
        Command::Delete { key, remote } => {
            let url = resolve(&remote);
            remote::run_delete(&url, &key).await
        }
    }
}

fn resolve(args: &RemoteArgs) -> String {
    let config = remote::load_remote_config(&args.config);
    remote::resolve_remote_url(args.remote.as_deref(), &config)
}
