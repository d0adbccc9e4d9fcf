mod env_commands;

use {
    clap::{Parser, Subcommand},
    tokenrelay_config::Settings,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tokenrelay", about = "OAuth2 login relay with sealed refresh tokens")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Check that the provider grants every configured scope.
    CheckScopes {
        /// Environment name (live, sandbox or a custom one).
        #[arg(long)]
        env: String,
    },
    /// Print a CUSTOM_ENVIRONMENTS value for environments sharing one client.
    CustomEnvToken {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        secret: String,
        /// Comma-separated environment names.
        #[arg(long, value_delimiter = ',', required = true)]
        names: Vec<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Commands::Serve { bind, port } => {
            info!(version = env!("CARGO_PKG_VERSION"), "tokenrelay starting");
            let settings = Settings::from_env()?;
            tokenrelay_gateway::start_gateway(settings, &bind, port).await
        },
        Commands::CheckScopes { env } => {
            let settings = Settings::from_env()?;
            env_commands::check_scopes(&settings, &env).await
        },
        Commands::CustomEnvToken {
            client_id,
            secret,
            names,
        } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            println!(
                "{}",
                env_commands::custom_env_token(&client_id, &secret, &names)?
            );
            Ok(())
        },
    }
}
