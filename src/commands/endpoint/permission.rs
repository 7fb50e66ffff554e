use super::{principal_str, principal_values, resolve_identity_principals};
use crate::{
    parsing::{
        parse_endpoint_plus_reqpath, parse_string_or_null, EndpointPath, Nullable,
        PermissionPrincipalOpts,
    },
    services::transfer::assemble_generic_doc,
    termio::{Display, Field},
    Context,
};
use serde_json::json;

/// Manage endpoint permissions (access control rules)
#[derive(clap::Subcommand)]
pub enum Args {
    List(List),
    Create(Create),
    Update(Update),
    Delete(Delete),
}

/// List all access control rules on an endpoint
#[derive(clap::Parser)]
pub struct List {
    endpoint_id: uuid::Uuid,
}

fn permissions_parser() -> clap::builder::PossibleValuesParser {
    clap::builder::PossibleValuesParser::new(["r", "rw"])
}

/// Create an access control rule, allowing new permissions
#[derive(clap::Parser)]
pub struct Create {
    #[arg(value_name = "ENDPOINT_ID:PATH", value_parser = parse_endpoint_plus_reqpath)]
    target: EndpointPath,
    /// Permissions to add. Read-Only or Read/Write
    #[arg(long, value_parser = permissions_parser(), ignore_case = true)]
    permissions: String,
    #[clap(flatten)]
    principal: PermissionPrincipalOpts,
    /// An email address to notify that the permission has been added
    #[arg(long)]
    notify_email: Option<String>,
    /// A custom message to add to email notifications
    #[arg(long)]
    notify_message: Option<String>,
    /// Expiration date for the permission in ISO 8601 format
    #[arg(long)]
    expiration_date: Option<String>,
}

/// Update an existing access control rule's permissions
#[derive(clap::Parser)]
pub struct Update {
    endpoint_id: uuid::Uuid,
    rule_id: String,
    /// Permissions to add. Read-Only or Read/Write
    #[arg(long, value_parser = permissions_parser(), ignore_case = true)]
    permissions: String,
    /// Expiration date for the permission in ISO 8601 format. Pass an empty
    /// string to remove an existing expiration date.
    #[arg(long, value_parser = parse_string_or_null)]
    expiration_date: Option<Nullable<String>>,
}

/// Delete an access control rule, removing permissions
#[derive(clap::Parser)]
pub struct Delete {
    endpoint_id: uuid::Uuid,
    rule_id: String,
}

#[derive(serde::Serialize)]
struct RuleUpdate<'a> {
    permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration_date: Option<&'a Nullable<String>>,
}

impl Update {
    fn document(&self) -> anyhow::Result<serde_json::Value> {
        assemble_generic_doc(
            "access",
            RuleUpdate {
                permissions: self.permissions.to_lowercase(),
                expiration_date: self.expiration_date.as_ref(),
            },
        )
    }
}

#[derive(serde::Serialize)]
struct RuleCreate<'a> {
    principal_type: &'a str,
    principal: &'a str,
    path: &'a str,
    permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notify_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notify_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration_date: Option<&'a str>,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    match args {
        Args::List(list) => {
            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .get(&format!("endpoint/{}/access_list", list.endpoint_id), &[])
                .await?;

            let identities =
                resolve_identity_principals(ctx, res.get("DATA").unwrap_or(&json!([]))).await?;

            ctx.printer.display(
                &res,
                &Display::table(vec![
                    Field::new("Rule ID", "id"),
                    Field::new("Permissions", "permissions"),
                    Field::with("Shared With", move |rule| principal_str(rule, &identities)),
                    Field::new("Path", "path"),
                    Field::new("Expiration Date", "expiration_date"),
                ])
                .response_key("DATA"),
            )
        }
        Args::Create(create) => {
            let principal = create.principal.principal()?;
            let (principal_type, principal) = principal_values(ctx, &principal).await?;

            let doc = assemble_generic_doc(
                "access",
                RuleCreate {
                    principal_type,
                    principal: &principal,
                    path: create.target.path.as_deref().unwrap_or_default(),
                    permissions: create.permissions.to_lowercase(),
                    notify_email: create.notify_email.as_deref(),
                    notify_message: create.notify_message.as_deref(),
                    expiration_date: create.expiration_date.as_deref(),
                },
            )?;

            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .post(&format!("endpoint/{}/access", create.target.endpoint_id), &doc)
                .await?;
            ctx.printer.display(
                &res,
                &Display::record(vec![
                    Field::new("Message", "message"),
                    Field::new("Rule ID", "access_id"),
                ]),
            )
        }
        Args::Update(update) => {
            let doc = update.document()?;
            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .put(
                    &format!("endpoint/{}/access/{}", update.endpoint_id, update.rule_id),
                    &doc,
                )
                .await?;
            ctx.printer.display(&res, &Display::raw("message"))
        }
        Args::Delete(delete) => {
            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .delete(&format!(
                    "endpoint/{}/access/{}",
                    delete.endpoint_id, delete.rule_id
                ))
                .await?;
            ctx.printer.display(&res, &Display::raw("message"))
        }
    }
}
