pub mod collection;
pub mod delete;
pub mod endpoint;
pub mod flows;
pub mod login;
pub mod search;
pub mod session;
pub mod task;
pub mod timer;
pub mod transfer;
pub mod whoami;

use crate::{login::scopes, Context, RequiresLogin};

/// The `globus` subcommands
#[derive(clap::Subcommand)]
pub enum Args {
    Login(login::Login),
    Logout(login::Logout),
    Whoami(whoami::Args),
    #[clap(subcommand)]
    Session(session::Args),
    Transfer(transfer::Args),
    Delete(delete::Delete),
    Rm(delete::Rm),
    #[clap(subcommand)]
    Task(task::Args),
    #[clap(subcommand)]
    Endpoint(endpoint::Args),
    #[clap(subcommand)]
    Collection(collection::Args),
    #[clap(subcommand)]
    Search(search::Args),
    #[clap(subcommand)]
    Timer(timer::Args),
    #[clap(subcommand, hide = true)]
    Flows(flows::Args),
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        match self {
            Self::Login(_) | Self::Logout(_) | Self::Session(_) => &[],
            Self::Whoami(_) => &[scopes::AUTH_RS],
            Self::Transfer(_) | Self::Delete(_) | Self::Rm(_) => &[scopes::TRANSFER_RS],
            Self::Task(a) => a.resource_servers(),
            Self::Endpoint(a) => a.resource_servers(),
            Self::Collection(a) => a.resource_servers(),
            Self::Search(a) => a.resource_servers(),
            Self::Timer(a) => a.resource_servers(),
            Self::Flows(a) => a.resource_servers(),
        }
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    match args {
        Args::Login(a) => login::run_login(a, ctx).await,
        Args::Logout(a) => login::run_logout(a, ctx).await,
        Args::Whoami(a) => whoami::run(a, ctx).await,
        Args::Session(a) => session::run(a, ctx).await,
        Args::Transfer(a) => transfer::run(a, ctx).await,
        Args::Delete(a) => delete::run_delete(a, ctx).await,
        Args::Rm(a) => delete::run_rm(a, ctx).await,
        Args::Task(a) => task::run(a, ctx).await,
        Args::Endpoint(a) => endpoint::run(a, ctx).await,
        Args::Collection(a) => collection::run(a, ctx).await,
        Args::Search(a) => search::run(a, ctx).await,
        Args::Timer(a) => timer::run(a, ctx).await,
        Args::Flows(a) => flows::run(a, ctx).await,
    }
}

/// Asks a yes/no question on stderr, defaulting to no
pub(crate) fn confirm(question: &str) -> anyhow::Result<bool> {
    use anyhow::Context as _;
    use std::io::Write as _;

    let mut stderr = std::io::stderr();
    write!(stderr, "{question} [y/N]: ")?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read answer from stdin")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
