pub mod permission;
pub mod role;
pub mod server;

use crate::{
    login::scopes,
    parsing::{parse_string_or_null, parse_url_or_null, Nullable, ParsedIdentity, Principal},
    services::{auth::lookup_identity_id, auth::IdentityMap, transfer::assemble_generic_doc},
    termio::{Display, Field},
    usage_error, Context, RequiresLogin,
};
use serde_json::Value;

/// Manage Globus endpoint definitions
#[derive(clap::Subcommand)]
pub enum Args {
    Show(Show),
    Update(Update),
    #[clap(subcommand)]
    Role(role::Args),
    #[clap(subcommand)]
    Permission(permission::Args),
    #[clap(subcommand)]
    Server(server::Args),
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        match self {
            Self::Show(_) | Self::Update(_) | Self::Server(_) => &[scopes::TRANSFER_RS],
            Self::Role(_) | Self::Permission(_) => &[scopes::AUTH_RS, scopes::TRANSFER_RS],
        }
    }
}

/// Display a detailed endpoint definition
#[derive(clap::Parser)]
pub struct Show {
    endpoint_id: uuid::Uuid,
}

/// Update attributes of an endpoint.
///
/// Passing an empty string to an option which accepts one unsets that
/// attribute.
#[derive(clap::Parser)]
pub struct Update {
    endpoint_id: uuid::Uuid,
    /// Name for the endpoint
    #[arg(long)]
    display_name: Option<String>,
    /// Description for the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    description: Option<Nullable<String>>,
    /// Link for info about the endpoint
    #[arg(long, value_parser = parse_url_or_null)]
    info_link: Option<Nullable<String>>,
    /// Contact info for the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    contact_info: Option<Nullable<String>>,
    /// Contact email for the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    contact_email: Option<Nullable<String>>,
    /// Organization for the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    organization: Option<Nullable<String>>,
    /// Department which operates the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    department: Option<Nullable<String>>,
    /// Comma separated list of keywords to help searches for the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    keywords: Option<Nullable<String>>,
    /// Default directory when browsing or executing tasks on the endpoint
    #[arg(long, value_parser = parse_string_or_null)]
    default_directory: Option<Nullable<String>>,
    /// Set the endpoint as a managed endpoint, with the given subscription ID
    #[arg(long, value_parser = parse_string_or_null)]
    subscription_id: Option<Nullable<String>>,
    /// Require all transfers to and from the endpoint to be encrypted
    #[arg(long, conflicts_with = "no_force_encryption")]
    force_encryption: bool,
    /// Don't require encryption of transfers
    #[arg(long)]
    no_force_encryption: bool,
    /// Make the endpoint visible to all users
    #[arg(long, conflicts_with = "private")]
    public: bool,
    /// Make the endpoint visible only to its owner and administrators
    #[arg(long)]
    private: bool,
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(serde::Serialize)]
struct EndpointUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    info_link: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_info: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_email: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_directory: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscription_id: Option<&'a Nullable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    force_encryption: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public: Option<bool>,
}

impl Update {
    fn document(&self) -> anyhow::Result<Value> {
        assemble_generic_doc(
            "endpoint",
            EndpointUpdate {
                display_name: self.display_name.as_deref(),
                description: self.description.as_ref(),
                info_link: self.info_link.as_ref(),
                contact_info: self.contact_info.as_ref(),
                contact_email: self.contact_email.as_ref(),
                organization: self.organization.as_ref(),
                department: self.department.as_ref(),
                keywords: self.keywords.as_ref(),
                default_directory: self.default_directory.as_ref(),
                subscription_id: self.subscription_id.as_ref(),
                force_encryption: flag_pair(self.force_encryption, self.no_force_encryption),
                public: flag_pair(self.public, self.private),
            },
        )
    }
}

fn endpoint_fields() -> Vec<Field> {
    vec![
        Field::new("Display Name", "display_name"),
        Field::new("ID", "id"),
        Field::new("Owner", "owner_string"),
        Field::new("Description", "description"),
        Field::new("Shareable", "shareable"),
        Field::new("Department", "department"),
        Field::new("Keywords", "keywords"),
        Field::new("Endpoint Info Link", "info_link"),
        Field::new("Contact E-mail", "contact_email"),
        Field::new("Organization", "organization"),
        Field::new("Other Contact Info", "contact_info"),
        Field::new("Visible To", "public"),
        Field::new("Default Directory", "default_directory"),
        Field::new("Force Encryption", "force_encryption"),
        Field::with("Managed Endpoint", |ep| {
            let managed = ep.get("subscription_id").is_some_and(|s| !s.is_null());
            crate::termio::render_value(&Value::Bool(managed))
        }),
        Field::new("Subscription ID", "subscription_id"),
        Field::new("Legacy Name", "canonical_name"),
        Field::new("Local User Info Available", "local_user_info_available"),
        Field::new("GCS Version", "gcs_version"),
    ]
}

/// Resolves a principal into the `principal_type` and `principal` values
/// Transfer expects, looking usernames up in Auth
pub(crate) async fn principal_values(
    ctx: &Context,
    principal: &Principal,
) -> anyhow::Result<(&'static str, String)> {
    let value = match principal {
        Principal::Identity(ParsedIdentity::Id(id)) => id.to_string(),
        Principal::Identity(ParsedIdentity::Username(name)) => {
            let auth = ctx.login_manager.get_auth_client().await?;
            match lookup_identity_id(&auth, name, false).await? {
                Some(id) => id,
                None => usage_error!(
                    "Identity does not exist. Use --provision-identity to auto-provision an identity."
                ),
            }
        }
        Principal::ProvisionIdentity(name) => {
            let auth = ctx.login_manager.get_auth_client().await?;
            lookup_identity_id(&auth, name, true)
                .await?
                .ok_or_else(|| anyhow::anyhow!("identity '{name}' could not be provisioned"))?
        }
        Principal::Group(group) => group.clone(),
        Principal::Anonymous | Principal::AllAuthenticatedUsers => String::new(),
    };

    Ok((principal.principal_type(), value))
}

/// Looks up the usernames of every identity principal in a list of roles or
/// access rules
pub(crate) async fn resolve_identity_principals(
    ctx: &Context,
    items: &Value,
) -> anyhow::Result<IdentityMap> {
    let ids = items
        .as_array()
        .into_iter()
        .flatten()
        .filter(|i| i.get("principal_type").and_then(|t| t.as_str()) == Some("identity"))
        .filter_map(|i| i.get("principal").and_then(|p| p.as_str()))
        .map(String::from);

    let auth = ctx.login_manager.get_auth_client().await?;
    IdentityMap::resolve(&auth, ids).await
}

/// Renders the principal of a role or rule: usernames for identities and a
/// web app link for groups
pub(crate) fn principal_str(item: &Value, identities: &IdentityMap) -> String {
    let principal = item.get("principal").and_then(|p| p.as_str()).unwrap_or_default();
    match item.get("principal_type").and_then(|t| t.as_str()) {
        Some("identity") => identities.username_or_id(principal),
        Some("group") => format!("https://app.globus.org/groups/{principal}"),
        Some(other) if principal.is_empty() => other.to_owned(),
        _ => principal.to_owned(),
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    match args {
        Args::Show(show) => {
            let transfer = ctx.login_manager.get_transfer_client().await?;
            let ep = transfer
                .get(&format!("endpoint/{}", show.endpoint_id), &[])
                .await?;
            ctx.printer.display(&ep, &Display::record(endpoint_fields()))
        }
        Args::Update(update) => {
            let doc = update.document()?;
            let transfer = ctx.login_manager.get_transfer_client().await?;
            let res = transfer
                .put(&format!("endpoint/{}", update.endpoint_id), &doc)
                .await?;
            ctx.printer.display(&res, &Display::raw("message"))
        }
        Args::Role(role) => role::run(role, ctx).await,
        Args::Permission(permission) => permission::run(permission, ctx).await,
        Args::Server(server) => server::run(server, ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[test]
    fn update_document_nulls() {
        let update = Update::try_parse_from([
            "update",
            "ddb59aef-6d04-11e5-ba46-22000b92c6ec",
            "--description",
            "",
            "--info-link",
            "https://example.org/info",
            "--no-force-encryption",
        ])
        .unwrap();

        assert_eq!(
            update.document().unwrap(),
            json!({
                "DATA_TYPE": "endpoint",
                "description": null,
                "info_link": "https://example.org/info",
                "force_encryption": false,
            })
        );
    }

    #[test]
    fn bad_info_link() {
        assert!(Update::try_parse_from([
            "update",
            "ddb59aef-6d04-11e5-ba46-22000b92c6ec",
            "--info-link",
            "ftp://example.org",
        ])
        .is_err());
    }

    #[test]
    fn principal_rendering() {
        let ids = IdentityMap::default();
        assert_eq!(
            principal_str(
                &json!({"principal_type": "group", "principal": "abc"}),
                &ids
            ),
            "https://app.globus.org/groups/abc"
        );
        assert_eq!(
            principal_str(
                &json!({"principal_type": "identity", "principal": "id-1"}),
                &ids
            ),
            "id-1"
        );
        assert_eq!(
            principal_str(
                &json!({"principal_type": "anonymous", "principal": ""}),
                &ids
            ),
            "anonymous"
        );
    }
}
