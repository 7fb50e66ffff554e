use crate::{
    config::Service,
    error::ExitStatus,
    login::{is_remote_session, scopes},
    parsing::NoLocalServerOption,
    usage_error, Context,
};

const ALREADY_LOGGED_IN: &str = "\
You are already logged in!

You may force a new login with
  globus login --force

You can check your primary identity with
  globus whoami";

const LOGIN_SUCCESS: &str = "\
You have successfully logged in to the Globus CLI!

You can check your primary identity with
  globus whoami

Logout of the Globus CLI with
  globus logout";

/// Log into Globus to get credentials for the Globus CLI
#[derive(clap::Parser)]
pub struct Login {
    #[clap(flatten)]
    no_local_server: NoLocalServerOption,
    /// Do a fresh login, ignoring any existing credentials
    #[arg(long)]
    force: bool,
    /// Also log into the given Globus Connect Server v5 endpoint, which is
    /// required to manage its collections. May be given multiple times.
    #[arg(long = "gcs", value_name = "ENDPOINT_ID")]
    gcs: Vec<uuid::Uuid>,
}

pub async fn run_login(args: Login, ctx: &Context) -> anyhow::Result<()> {
    let lm = &ctx.login_manager;
    if lm.is_client_login() {
        usage_error!(
            "'globus login' is not needed when GLOBUS_CLI_CLIENT_ID and \
             GLOBUS_CLI_CLIENT_SECRET are set, tokens are fetched as needed"
        );
    }

    let resource_servers: Vec<String> = scopes::ALL_RESOURCE_SERVERS
        .iter()
        .map(|rs| (*rs).to_owned())
        .chain(args.gcs.iter().map(|id| id.to_string()))
        .collect();

    if !args.force {
        let mut logged_in = true;
        for rs in &resource_servers {
            logged_in &= lm.has_login(rs).await;
        }
        if logged_in {
            println!("{ALREADY_LOGGED_IN}");
            return Ok(());
        }
    }

    let requested: Vec<String> = resource_servers
        .iter()
        .flat_map(|rs| scopes::request_scopes(rs))
        .collect();
    let no_local_server = args.no_local_server.no_local_server || is_remote_session();

    let tokens = lm
        .login_client()
        .run_login_flow(&requested, no_local_server, &[])
        .await?;
    lm.store_login(tokens).await?;

    println!("{LOGIN_SUCCESS}");
    Ok(())
}

/// Logout of the Globus CLI, revoking and removing all stored tokens
#[derive(clap::Parser)]
pub struct Logout {
    /// Automatically say "yes" to all prompts
    #[arg(long)]
    yes: bool,
}

pub async fn run_logout(args: Logout, ctx: &Context) -> anyhow::Result<()> {
    if !args.yes && !super::confirm("Are you sure you want to logout?")? {
        eprintln!("Aborted.");
        return Err(ExitStatus(1).into());
    }

    let removed = ctx.login_manager.logout().await?;
    tracing::debug!(removed, "removed stored tokens");

    if ctx.login_manager.is_client_login() {
        println!("Revoked all tokens for the configured client.");
        return Ok(());
    }

    println!(
        "You are now successfully logged out of the Globus CLI.\n\
         You may also want to logout of any browser session you may have with Globus:\n\n  \
         {}/v2/web/logout",
        ctx.login_manager.config().base_url(Service::Auth)
    );
    Ok(())
}
