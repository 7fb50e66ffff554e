use crate::{
    login::scopes,
    services::auth::IdentityMap,
    termio::{Display, Field},
    Context, RequiresLogin,
};
use serde_json::Value;

const IDENTITY_URN: &str = "urn:globus:auth:identity:";
const GROUP_URN: &str = "urn:globus:groups:id:";

/// Use Globus Search to store and query for data
#[derive(clap::Subcommand)]
pub enum Args {
    #[clap(subcommand)]
    Index(Index),
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        match self {
            Self::Index(Index::Role(_)) => &[scopes::SEARCH_RS, scopes::AUTH_RS],
            Self::Index(_) => &[scopes::SEARCH_RS],
        }
    }
}

/// View and manage indices
#[derive(clap::Subcommand)]
pub enum Index {
    /// List indices where you have some permissions
    List,
    /// Display information about an index
    Show { index_id: uuid::Uuid },
    /// (BETA) Delete a Search Index
    Delete { index_id: String },
    #[clap(subcommand)]
    Role(Role),
}

/// View and manage index roles
#[derive(clap::Subcommand)]
pub enum Role {
    /// List roles on an index (requires admin)
    List { index_id: uuid::Uuid },
}

fn index_fields() -> Vec<Field> {
    vec![
        Field::new("Index ID", "id"),
        Field::new("Display Name", "display_name"),
        Field::new("Status", "status"),
    ]
}

/// Renders a role principal URN, using the username for identities
fn render_principal(item: &Value, identities: &IdentityMap) -> String {
    let principal = item
        .get("principal")
        .and_then(|p| p.as_str())
        .unwrap_or_default();

    if let Some(id) = principal.strip_prefix(IDENTITY_URN) {
        match identities.get(id).and_then(|i| i.get("username")).and_then(|u| u.as_str()) {
            Some(username) => username.to_owned(),
            None => principal.to_owned(),
        }
    } else if let Some(id) = principal.strip_prefix(GROUP_URN) {
        format!("Globus Group ({id})")
    } else {
        principal.to_owned()
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let Args::Index(index) = args;
    let search = ctx.login_manager.get_search_client().await?;

    match index {
        Index::List => {
            let res = search.get("v1/index_list", &[]).await?;
            ctx.printer
                .display(&res, &Display::table(index_fields()).response_key("index_list"))
        }
        Index::Show { index_id } => {
            let res = search.get(&format!("v1/index/{index_id}"), &[]).await?;
            let mut fields = index_fields();
            fields.extend([
                Field::new("Description", "description"),
                Field::new("Is Trial", "is_trial"),
                Field::new("Subject Count", "num_subjects"),
                Field::new("Entry Count", "num_entries"),
                Field::new("Size (MB)", "size_in_mb"),
                Field::new("Max Size (MB)", "max_size_in_mb"),
                Field::new("Created At", "creation_date"),
            ]);
            ctx.printer.display(&res, &Display::record(fields))
        }
        Index::Delete { index_id } => {
            let res = search.delete(&format!("beta/index/{index_id}")).await?;
            ctx.printer.display(
                &res,
                &Display::simple(format!(
                    "Index {index_id} is now marked for deletion.\n\
                     It will be fully deleted after cleanup steps complete."
                )),
            )
        }
        Index::Role(Role::List { index_id }) => {
            let res = search
                .get(&format!("v1/index/{index_id}/role_list"), &[])
                .await?;

            let ids = res
                .get("role_list")
                .and_then(|r| r.as_array())
                .into_iter()
                .flatten()
                .filter_map(|r| r.get("principal").and_then(|p| p.as_str()))
                .filter_map(|p| p.strip_prefix(IDENTITY_URN))
                .map(String::from);

            let auth = ctx.login_manager.get_auth_client().await?;
            let identities = IdentityMap::resolve(&auth, ids).await?;

            ctx.printer.display(
                &res,
                &Display::table(vec![
                    Field::new("ID", "id"),
                    Field::new("Role", "role_name"),
                    Field::with("Principal", move |r| render_principal(r, &identities)),
                ])
                .response_key("role_list"),
            )
        }
    }
}
