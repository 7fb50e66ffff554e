use super::{principal_str, principal_values, resolve_identity_principals};
use crate::{
    parsing::SecurityPrincipalOpts,
    termio::{Display, Field},
    Context,
};
use serde_json::json;

/// Manage endpoint roles
#[derive(clap::Subcommand)]
pub enum Args {
    List(List),
    Create(Create),
}

/// List the assigned roles on an endpoint.
///
/// You must have sufficient privileges to see the roles on the endpoint.
#[derive(clap::Parser)]
pub struct List {
    endpoint_id: uuid::Uuid,
}

/// Create a role on an endpoint.
///
/// You must have sufficient privileges to modify the roles on the endpoint.
#[derive(clap::Parser)]
pub struct Create {
    endpoint_id: uuid::Uuid,
    /// A role to assign
    #[arg(
        long,
        value_parser = clap::builder::PossibleValuesParser::new([
            "administrator",
            "access_manager",
            "activity_manager",
            "activity_monitor",
        ])
    )]
    role: String,
    #[clap(flatten)]
    principal: SecurityPrincipalOpts,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    match args {
        Args::List(list) => {
            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .get(&format!("endpoint/{}/role_list", list.endpoint_id), &[])
                .await?;

            let identities =
                resolve_identity_principals(ctx, res.get("DATA").unwrap_or(&json!([]))).await?;

            ctx.printer.display(
                &res,
                &Display::table(vec![
                    Field::new("Principal Type", "principal_type"),
                    Field::new("Role ID", "id"),
                    Field::with("Principal", move |role| principal_str(role, &identities)),
                    Field::new("Role", "role"),
                ])
                .response_key("DATA"),
            )
        }
        Args::Create(create) => {
            let principal = create.principal.principal()?;
            let (principal_type, principal) = principal_values(ctx, &principal).await?;

            let doc = json!({
                "DATA_TYPE": "role",
                "principal_type": principal_type,
                "principal": principal,
                "role": create.role,
            });

            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .post(&format!("endpoint/{}/role", create.endpoint_id), &doc)
                .await?;
            ctx.printer.display(
                &res,
                &Display::record(vec![Field::new("ID", "id")])
                    .preamble(format!("Role {} created", create.role)),
            )
        }
    }
}
