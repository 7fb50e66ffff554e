//! Resource servers and the scopes the CLI requests for each of them

pub const AUTH_RS: &str = "auth.globus.org";
pub const TRANSFER_RS: &str = "transfer.api.globus.org";
pub const SEARCH_RS: &str = "search.api.globus.org";
pub const TIMER_RS: &str = "524230d7-ea86-4a52-8312-86065a9e0417";
pub const FLOWS_RS: &str = "flows.globus.org";

/// Every resource server a plain `globus login` requests
pub const ALL_RESOURCE_SERVERS: &[&str] = &[AUTH_RS, TRANSFER_RS, SEARCH_RS, TIMER_RS, FLOWS_RS];

const AUTH_SCOPES: &[&str] = &[
    "openid",
    "profile",
    "email",
    "urn:globus:auth:scope:auth.globus.org:view_identity_set",
];
const TRANSFER_SCOPES: &[&str] = &["urn:globus:auth:scope:transfer.api.globus.org:all"];
const SEARCH_SCOPES: &[&str] = &["urn:globus:auth:scope:search.api.globus.org:all"];
const TIMER_SCOPES: &[&str] =
    &["https://auth.globus.org/scopes/524230d7-ea86-4a52-8312-86065a9e0417/timer"];
const FLOWS_SCOPES: &[&str] = &[
    "https://auth.globus.org/scopes/eec9b274-0c81-4334-bdc2-54e90e689b9a/manage_flows",
    "https://auth.globus.org/scopes/eec9b274-0c81-4334-bdc2-54e90e689b9a/view_flows",
    "https://auth.globus.org/scopes/eec9b274-0c81-4334-bdc2-54e90e689b9a/run_status",
];

/// The scope strings a stored token for `resource_server` must carry.
///
/// GCS endpoints are identified by their endpoint id, which doubles as the
/// resource server.
pub fn required_scopes(resource_server: &str) -> Vec<String> {
    let known = match resource_server {
        AUTH_RS => AUTH_SCOPES,
        TRANSFER_RS => TRANSFER_SCOPES,
        SEARCH_RS => SEARCH_SCOPES,
        TIMER_RS => TIMER_SCOPES,
        FLOWS_RS => FLOWS_SCOPES,
        endpoint_id => return vec![gcs_manage_collections_scope(endpoint_id)],
    };

    known.iter().map(|s| (*s).to_owned()).collect()
}

/// The scope strings to put in an authorization request for `resource_server`,
/// including dependent scopes
pub fn request_scopes(resource_server: &str) -> Vec<String> {
    match resource_server {
        // timers run transfers on the user's behalf, so they need a dependent
        // transfer scope
        TIMER_RS => vec![format!("{}[{}]", TIMER_SCOPES[0], TRANSFER_SCOPES[0])],
        other => required_scopes(other),
    }
}

pub fn gcs_manage_collections_scope(endpoint_id: &str) -> String {
    format!("urn:globus:auth:scope:{endpoint_id}:manage_collections")
}

/// Whether a space separated scope string granted by Auth covers all of the
/// required scopes
pub fn scope_string_covers(granted: &str, required: &[String]) -> bool {
    required
        .iter()
        .all(|req| granted.split_whitespace().any(|g| g == req))
}
