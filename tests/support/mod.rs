#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::{json, Value};

pub const SRC: &str = "ddb59aef-6d04-11e5-ba46-22000b92c6ec";
pub const DST: &str = "ddb59af0-6d04-11e5-ba46-22000b92c6ec";

pub const AUTH_RS: &str = "auth.globus.org";
pub const TRANSFER_RS: &str = "transfer.api.globus.org";
pub const TIMER_RS: &str = "524230d7-ea86-4a52-8312-86065a9e0417";
pub const FLOWS_RS: &str = "flows.globus.org";

/// 2100-01-01
pub const FAR_FUTURE: i64 = 4102444800;

pub fn globus(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("globus"));
    cmd.env("GLOBUS_CLI_CONFIG_DIR", config_dir)
        .env("NO_PROXY", "127.0.0.1")
        .env_remove("GLOBUS_CLI_CLIENT_ID")
        .env_remove("GLOBUS_CLI_CLIENT_SECRET")
        .env_remove("GLOBUS_SDK_ENVIRONMENT")
        .env_remove("RUST_LOG");
    for service in ["AUTH", "TRANSFER", "SEARCH", "TIMER", "FLOWS"] {
        cmd.env_remove(format!("GLOBUS_SDK_SERVICE_URL_{service}"));
    }
    cmd
}

fn scope_for(resource_server: &str) -> String {
    match resource_server {
        AUTH_RS => "openid profile email urn:globus:auth:scope:auth.globus.org:view_identity_set"
            .to_owned(),
        TRANSFER_RS => "urn:globus:auth:scope:transfer.api.globus.org:all".to_owned(),
        TIMER_RS => format!("https://auth.globus.org/scopes/{TIMER_RS}/timer"),
        FLOWS_RS => [
            "manage_flows",
            "view_flows",
            "run_status",
        ]
        .map(|s| format!("https://auth.globus.org/scopes/eec9b274-0c81-4334-bdc2-54e90e689b9a/{s}"))
        .join(" "),
        endpoint_id => format!("urn:globus:auth:scope:{endpoint_id}:manage_collections"),
    }
}

/// A stored token for `resource_server` carrying the scopes the CLI checks for
pub fn token(resource_server: &str, expires_at_seconds: i64) -> Value {
    json!({
        "resource_server": resource_server,
        "access_token": format!("{resource_server}-access-token"),
        "refresh_token": format!("{resource_server}-refresh-token"),
        "expires_at_seconds": expires_at_seconds,
        "scope": scope_for(resource_server),
        "token_type": "Bearer",
    })
}

/// A config dir whose storage holds the given tokens
pub fn config_dir(tokens: impl IntoIterator<Item = Value>) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let tokens: serde_json::Map<String, Value> = tokens
        .into_iter()
        .map(|t| (t["resource_server"].as_str().unwrap().to_owned(), t))
        .collect();
    let storage = json!({
        "namespaces": {
            "userprofile/production": {
                "tokens": tokens,
                "identity_id": "c8aad43e-d274-11e5-bf98-8b02896cf782",
            }
        }
    });
    std::fs::write(
        dir.path().join("storage.json"),
        serde_json::to_vec(&storage).unwrap(),
    )
    .unwrap();
    dir
}

/// A config dir logged in to the given resource servers with long lived tokens
pub fn logged_in(resource_servers: &[&str]) -> tempfile::TempDir {
    config_dir(resource_servers.iter().map(|rs| token(rs, FAR_FUTURE)))
}

pub fn stored_tokens(config_dir: &std::path::Path) -> Value {
    let storage: Value =
        serde_json::from_slice(&std::fs::read(config_dir.join("storage.json")).unwrap()).unwrap();
    storage["namespaces"]["userprofile/production"]["tokens"].clone()
}

/// An HTTP server standing in for a Globus service, running on its own
/// runtime while the CLI binary runs in the foreground
pub struct MockService {
    pub url: String,
    _runtime: tokio::runtime::Runtime,
}

impl MockService {
    pub fn start(app: axum::Router) -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        runtime.spawn(async move { axum::serve(listener, app).await.unwrap() });
        Self {
            url,
            _runtime: runtime,
        }
    }
}
