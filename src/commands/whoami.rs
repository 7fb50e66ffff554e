use crate::{
    error::ApiError,
    termio::{Display, Field},
    Context,
};

/// Show the currently logged-in primary identity
#[derive(clap::Parser)]
pub struct Args {
    /// Also show identities linked to the currently logged-in primary identity
    #[arg(long)]
    linked_identities: bool,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let auth = ctx.login_manager.get_auth_client().await?;

    let userinfo = match auth.get("/v2/oauth2/userinfo", &[]).await {
        Ok(u) => u,
        Err(err) if err.downcast_ref::<ApiError>().is_some() => {
            anyhow::bail!("Unable to get user information. Please try logging in again.");
        }
        Err(err) => return Err(err),
    };

    let display = if args.linked_identities {
        Display::table(vec![
            Field::new("Username", "username"),
            Field::new("Name", "name"),
            Field::new("ID", "sub"),
            Field::new("Email", "email"),
        ])
        .response_key("identity_set")
    } else {
        Display::raw("preferred_username")
    };

    ctx.printer.display(&userinfo, &display)
}
