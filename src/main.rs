use clap::Parser;
use globus_cli::{
    commands, config::Config, error, login::LoginManager, parsing::HttpStatusMap, termio,
    Context, RequiresLogin,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "globus", author, version, about)]
struct Cli {
    /// Output format for stdout
    #[arg(short = 'F', long, value_enum, global = true, default_value_t)]
    format: termio::Format,
    /// Control level of output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Show debug logging for everything, including HTTP traffic
    #[arg(long, global = true, hide = true)]
    debug: bool,
    /// Map HTTP statuses of API errors to exit codes, e.g. `404=50,403=51`.
    /// Exit codes must be 0, 1 or 50-99
    #[arg(long, global = true, value_name = "CODE=EXIT")]
    map_http_status: Option<HttpStatusMap>,
    #[clap(subcommand)]
    command: commands::Args,
}

fn init_logging(cli: &Cli) {
    let filter = if cli.debug {
        "debug"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "globus_cli=info,warn",
            2 => "globus_cli=debug,info",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing::debug!(?config, "resolved configuration");

    let ctx = Context {
        login_manager: LoginManager::new(config)?,
        printer: termio::Printer::new(cli.format),
    };

    ctx.login_manager
        .assert_logins(cli.command.resource_servers())
        .await?;

    commands::run(cli.command, &ctx).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let status_map = cli.map_http_status.clone().unwrap_or_default();

    if let Err(err) = run(cli).await {
        std::process::exit(error::report(&err, &status_map));
    }
}
