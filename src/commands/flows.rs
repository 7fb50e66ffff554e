use crate::{
    login::scopes,
    services::auth::IdentityMap,
    termio::{Display, Field},
    Context, RequiresLogin,
};
use serde_json::{json, Value};

const IDENTITY_URN: &str = "urn:globus:auth:identity:";

const ROLES: &[&str] = &[
    "flow_owner",
    "flow_viewer",
    "flow_starter",
    "flow_administrator",
    "run_monitor",
    "run_manager",
];

const ORDER_FIELDS: &[&str] = &[
    "id",
    "scope_string",
    "flow_owners",
    "flow_administrators",
    "title",
    "created_at",
    "updated_at",
];

/// Interact with the Globus Flows service
#[derive(clap::Subcommand)]
pub enum Args {
    List(List),
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        &[scopes::AUTH_RS, scopes::FLOWS_RS]
    }
}

/// Validates `FIELD ASC|DESC`
fn parse_orderby(value: &str) -> Result<String, String> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(field), Some(dir), None)
            if ORDER_FIELDS.contains(&field)
                && (dir.eq_ignore_ascii_case("asc") || dir.eq_ignore_ascii_case("desc")) =>
        {
            Ok(format!("{field} {}", dir.to_uppercase()))
        }
        _ => Err(format!(
            "'{value}' is not a valid ordering, expected 'FIELD ASC' or 'FIELD DESC' where \
             FIELD is one of {}",
            ORDER_FIELDS.join(", ")
        )),
    }
}

/// List flows
#[derive(clap::Parser)]
pub struct List {
    /// Filter results by the flow's role type associated with the caller
    #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(ROLES.iter().copied()))]
    filter_role: Option<String>,
    /// Filter results based on pattern matching within a subset of fields:
    /// [id, title, subtitle, description, flow_owner, flow_administrators]
    #[arg(long)]
    filter_fulltext: Option<String>,
    /// Sort results by the given field and ordering. ASC for ascending, DESC
    /// for descending. This option can be specified multiple times to sort by
    /// multiple fields.
    #[arg(long, value_parser = parse_orderby)]
    orderby: Vec<String>,
    /// The maximum number of results to return
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u64).range(1..=1000))]
    limit: u64,
}

impl List {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(role) = &self.filter_role {
            query.push(("filter_role", role.clone()));
        }
        if let Some(text) = &self.filter_fulltext {
            query.push(("filter_fulltext", text.clone()));
        }
        for order in &self.orderby {
            query.push(("orderby", order.clone()));
        }
        query
    }
}

fn owner_id(flow: &Value) -> Option<&str> {
    flow.get("flow_owner")
        .and_then(|o| o.as_str())
        .map(|o| o.strip_prefix(IDENTITY_URN).unwrap_or(o))
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let Args::List(list) = args;
    let flows_client = ctx.login_manager.get_flows_client().await?;

    let limit = usize::try_from(list.limit).unwrap_or(usize::MAX);
    let base_query = list.query();

    let mut flows = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let mut query = base_query.clone();
        if let Some(marker) = &marker {
            query.push(("marker", marker.clone()));
        }

        let page = flows_client.get("flows", &query).await?;
        if let Some(items) = page.get("flows").and_then(|f| f.as_array()) {
            flows.extend(items.iter().cloned());
        }
        tracing::debug!(fetched = flows.len(), "listed a page of flows");

        marker = page
            .get("marker")
            .and_then(|m| m.as_str())
            .map(String::from);
        let has_next = page
            .get("has_next_page")
            .and_then(|h| h.as_bool())
            .unwrap_or(false);

        if flows.len() >= limit || !has_next || marker.is_none() {
            break;
        }
    }
    flows.truncate(limit);

    let auth = ctx.login_manager.get_auth_client().await?;
    let identities =
        IdentityMap::resolve(&auth, flows.iter().filter_map(owner_id).map(String::from)).await?;

    ctx.printer.display(
        &json!({ "flows": flows }),
        &Display::table(vec![
            Field::new("Flow ID", "id"),
            Field::new("Title", "title"),
            Field::with("Owner", move |flow| match owner_id(flow) {
                Some(id) => identities.username_or_id(id),
                None => crate::termio::render_value(&Value::Null),
            }),
            Field::new("Created At", "created_at"),
            Field::new("Updated At", "updated_at"),
        ])
        .response_key("flows"),
    )
}
