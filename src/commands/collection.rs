use crate::{
    login::scopes,
    parsing::choice::slugified_choice,
    services::auth::IdentityMap,
    termio::{Display, Field},
    Context, RequiresLogin,
};
use serde_json::Value;

const FILTERS: &[&str] = &[
    "mapped-collections",
    "guest-collections",
    "managed-by-me",
    "created-by-me",
];

/// Manage your Collections
#[derive(clap::Subcommand)]
pub enum Args {
    List(List),
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        &[scopes::AUTH_RS, scopes::TRANSFER_RS]
    }
}

/// List the Collections on a given Globus Connect Server v5 Endpoint
#[derive(clap::Parser)]
pub struct List {
    endpoint_id: uuid::Uuid,
    /// Filter results to one of the specified categories of collections. Can be
    /// applied multiple times. Mutually exclusive filters are allowed and will
    /// find no results.
    ///
    /// mapped-collections: only collections with collection_type="mapped"
    ///
    /// guest-collections: only collections with collection_type="guest"
    ///
    /// managed-by-me: only collections where one of your identities has a role
    ///
    /// created-by-me: only collections where one of your identities was the
    /// creator
    #[arg(long = "filter", value_parser = slugified_choice(FILTERS))]
    filters: Vec<String>,
    /// Include private policies. Requires administrator role on the endpoint.
    /// Some policy data may only be visible in `--format json` output.
    #[arg(long)]
    include_private_policies: bool,
    /// Filter results to Guest Collections on a specific Mapped Collection
    #[arg(long)]
    mapped_collection_id: Option<uuid::Uuid>,
}

impl List {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(id) = &self.mapped_collection_id {
            query.push(("mapped_collection_id", id.to_string()));
        }
        if !self.filters.is_empty() {
            query.push(("filter", self.filters.join(",")));
        }
        if self.include_private_policies {
            query.push(("include", "private_policies".to_owned()));
        }
        query
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let Args::List(list) = args;

    let gcs = ctx.login_manager.get_gcs_client(&list.endpoint_id).await?;
    let auth = ctx.login_manager.get_auth_client().await?;

    let res = gcs.get("api/collections", &list.query()).await?;

    let owners = res
        .get("data")
        .and_then(|d| d.as_array())
        .into_iter()
        .flatten()
        .filter_map(|c| c.get("identity_id").and_then(|i| i.as_str()))
        .map(String::from);
    let identities = IdentityMap::resolve(&auth, owners).await?;

    ctx.printer.display(
        &res,
        &Display::table(vec![
            Field::new("ID", "id"),
            Field::new("Display Name", "display_name"),
            Field::with("Owner", move |c| {
                match c.get("identity_id").and_then(|i| i.as_str()) {
                    Some(id) => identities.username_or_id(id),
                    None => crate::termio::render_value(&Value::Null),
                }
            }),
            Field::new("Collection Type", "collection_type"),
            Field::new("Storage Gateway ID", "storage_gateway_id"),
        ])
        .response_key("data"),
    )
}
