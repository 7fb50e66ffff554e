use crate::{
    termio::{Display, Field},
    Context,
};
use serde_json::Value;

/// Manage servers for a Globus endpoint
#[derive(clap::Subcommand)]
pub enum Args {
    List(List),
    Show(Show),
}

/// List all servers belonging to an endpoint
#[derive(clap::Parser)]
pub struct List {
    endpoint_id: uuid::Uuid,
}

/// Display information about a server belonging to an endpoint
#[derive(clap::Parser)]
pub struct Show {
    endpoint_id: uuid::Uuid,
    server_id: String,
}

fn port_range_summary(start: &Value, end: &Value) -> String {
    let set = |v: &Value| !v.is_null() && v.as_i64() != Some(0);

    if !set(start) && !set(end) {
        "unspecified".to_owned()
    } else if start.as_i64() == Some(1024) && end.as_i64() == Some(65535) {
        "unrestricted".to_owned()
    } else {
        format!(
            "{}-{}",
            crate::termio::render_value(start),
            crate::termio::render_value(end)
        )
    }
}

/// Summarizes the data ports a server advertises, e.g.
/// `incoming 50000-51000, outgoing unrestricted`
pub fn advertised_port_summary(server: &Value) -> String {
    let get = |k: &str| server.get(k).unwrap_or(&Value::Null);
    format!(
        "incoming {}, outgoing {}",
        port_range_summary(
            get("incoming_data_port_start"),
            get("incoming_data_port_end")
        ),
        port_range_summary(
            get("outgoing_data_port_start"),
            get("outgoing_data_port_end")
        ),
    )
}

fn server_show_display(server: &Value, endpoint_id: &uuid::Uuid) -> Display {
    let has_uri = server
        .get("uri")
        .and_then(|u| u.as_str())
        .is_some_and(|u| !u.is_empty());

    if !has_uri {
        return Display::record(vec![Field::new("ID", "id")]).epilog(format!(
            "\nThis server is for a Globus Connect Personal installation.\n\n\
             For its connection status, try:\n\
             globus endpoint show {endpoint_id}"
        ));
    }

    Display::record(vec![
        Field::new("ID", "id"),
        Field::new("URI", "uri"),
        Field::new("Subject", "subject"),
        Field::with("Data Ports", advertised_port_summary),
    ])
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let transfer = ctx.login_manager.get_transfer_client().await?;

    match args {
        Args::List(list) => {
            let res = transfer
                .get(&format!("endpoint/{}/server_list", list.endpoint_id), &[])
                .await?;
            ctx.printer.display(
                &res,
                &Display::table(vec![Field::new("ID", "id"), Field::new("URI", "uri")])
                    .response_key("DATA"),
            )
        }
        Args::Show(show) => {
            let server = transfer
                .get(
                    &format!("endpoint/{}/server/{}", show.endpoint_id, show.server_id),
                    &[],
                )
                .await?;
            let display = server_show_display(&server, &show.endpoint_id);
            ctx.printer.display(&server, &display)
        }
    }
}
