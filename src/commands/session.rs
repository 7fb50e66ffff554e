use crate::{
    login::{is_remote_session, scopes},
    parsing::{
        choice::{comma_delimited, CommaList},
        identity::{parse_identity, ParsedIdentity},
        NoLocalServerOption,
    },
    services::auth::lookup_identity_id,
    usage_error, Context,
};

/// Manage your CLI auth session
#[derive(clap::Subcommand)]
pub enum Args {
    Consent(Consent),
    Update(Update),
}

/// Update your CLI auth session by consenting to specific scopes
#[derive(clap::Parser)]
pub struct Consent {
    /// The scopes to consent to, including any dependent scopes
    #[arg(required = true, value_name = "SCOPE")]
    scopes: Vec<String>,
    #[clap(flatten)]
    no_local_server: NoLocalServerOption,
}

/// Update your CLI auth session by authenticating with specific identities
#[derive(clap::Parser)]
pub struct Update {
    /// Usernames or ids of the identities to authenticate with
    #[arg(value_name = "IDENTITY", value_parser = parse_identity)]
    identities: Vec<ParsedIdentity>,
    /// Authenticate with every identity linked to your primary identity
    #[arg(long)]
    all: bool,
    /// Comma separated domains which the session must include an identity from
    #[arg(long, value_parser = comma_delimited(None))]
    domain: Option<CommaList>,
    /// Comma separated ids of authentication policies which the session must
    /// satisfy
    #[arg(long, value_parser = comma_delimited(None))]
    policy: Option<CommaList>,
    #[clap(flatten)]
    no_local_server: NoLocalServerOption,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    if ctx.login_manager.is_client_login() {
        usage_error!("Session management is not supported when using client credentials");
    }

    match args {
        Args::Consent(a) => consent(a, ctx).await,
        Args::Update(a) => update(a, ctx).await,
    }
}

async fn consent(args: Consent, ctx: &Context) -> anyhow::Result<()> {
    let lm = &ctx.login_manager;
    let no_local_server = args.no_local_server.no_local_server || is_remote_session();

    let tokens = lm
        .login_client()
        .run_login_flow(&args.scopes, no_local_server, &[])
        .await?;
    lm.store_login(tokens).await?;

    println!("You have successfully updated your CLI session.");
    Ok(())
}

async fn update(args: Update, ctx: &Context) -> anyhow::Result<()> {
    let lm = &ctx.login_manager;

    if args.identities.is_empty() && !args.all && args.domain.is_none() && args.policy.is_none() {
        usage_error!("You must pass at least one IDENTITY, --all, --domain, or --policy");
    }

    let mut identity_ids = Vec::new();
    if !args.identities.is_empty() || args.all {
        let auth = lm.get_auth_client().await?;

        for identity in &args.identities {
            match identity {
                ParsedIdentity::Id(id) => identity_ids.push(id.to_string()),
                ParsedIdentity::Username(name) => match lookup_identity_id(&auth, name, false).await? {
                    Some(id) => identity_ids.push(id),
                    None => usage_error!("No such identity: '{name}'"),
                },
            }
        }

        if args.all {
            let userinfo = auth.get("/v2/oauth2/userinfo", &[]).await?;
            for identity in userinfo
                .get("identity_set")
                .and_then(|s| s.as_array())
                .into_iter()
                .flatten()
            {
                if let Some(sub) = identity.get("sub").and_then(|s| s.as_str()) {
                    if !identity_ids.iter().any(|i| i == sub) {
                        identity_ids.push(sub.to_owned());
                    }
                }
            }
        }
    }

    let mut extra = Vec::new();
    if !identity_ids.is_empty() {
        extra.push((
            "session_required_identities".to_owned(),
            identity_ids.join(","),
        ));
    }
    if let Some(domains) = &args.domain {
        extra.push(("session_required_single_domain".to_owned(), domains.join()));
    }
    if let Some(policies) = &args.policy {
        extra.push(("session_required_policies".to_owned(), policies.join()));
    }

    let requested: Vec<String> = scopes::ALL_RESOURCE_SERVERS
        .iter()
        .flat_map(|rs| scopes::request_scopes(rs))
        .collect();
    let no_local_server = args.no_local_server.no_local_server || is_remote_session();

    let tokens = lm
        .login_client()
        .run_login_flow(&requested, no_local_server, &extra)
        .await?;
    lm.store_login(tokens).await?;

    println!("You have successfully updated your CLI session.");
    Ok(())
}
