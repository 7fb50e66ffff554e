//! Commands run against local stand-ins for the Globus services

mod support;

use assert_cmd::Command;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use support::{
    globus, logged_in, stored_tokens, token, MockService, AUTH_RS, DST, FLOWS_RS, SRC, TIMER_RS,
    TRANSFER_RS,
};

const SUCCEEDED_TASK: &str = "9a6a8a66-5a52-11ef-bb6b-0242ac110002";
const FAILED_TASK: &str = "9a6a8a66-5a52-11ef-bb6b-0242ac110003";
const ACTIVE_TASK: &str = "9a6a8a66-5a52-11ef-bb6b-0242ac110004";
const MISSING_TASK: &str = "9a6a8a66-5a52-11ef-bb6b-0242ac110005";
const TIMER: &str = "5c1f8a2e-0b7d-4c4e-9a55-3f1e6f7d2b10";

type Received<T> = Arc<Mutex<Vec<T>>>;

/// Points every service at the mock
fn against(mut cmd: Command, service: &MockService) -> Command {
    for name in ["AUTH", "TRANSFER", "SEARCH", "TIMER", "FLOWS"] {
        cmd.env(format!("GLOBUS_SDK_SERVICE_URL_{name}"), &service.url);
    }
    cmd
}

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": "ClientError.NotFound",
            "message": format!("{what} not found"),
            "request_id": "mock-request",
        })),
    )
}

async fn get_task(Path(task_id): Path<String>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let status = match task_id.as_str() {
        SUCCEEDED_TASK => "SUCCEEDED",
        FAILED_TASK => "FAILED",
        ACTIVE_TASK => "ACTIVE",
        _ => return Err(not_found(&format!("Task {task_id}"))),
    };
    Ok(Json(json!({
        "task_id": task_id,
        "type": "DELETE",
        "status": status,
    })))
}

async fn autoactivate(Path(endpoint_id): Path<String>) -> Json<Value> {
    if endpoint_id == DST {
        Json(json!({
            "code": "AutoActivationFailed",
            "message": "Auto-activation failed",
            "DATA": [
                {"type": "myproxy", "name": "hostname"},
                {"type": "myproxy", "name": "passphrase"},
                {"type": "delegate_myproxy", "name": "proxy_chain"},
            ],
        }))
    } else {
        Json(json!({"code": "AutoActivated.CachedCredential"}))
    }
}

async fn get_endpoint(Path(endpoint_id): Path<String>) -> Json<Value> {
    let entity_type = if endpoint_id == DST {
        "GCSv5_endpoint"
    } else {
        "GCP_mapped_collection"
    };
    Json(json!({
        "id": endpoint_id,
        "entity_type": entity_type,
        "gcs_manager_url": "https://gcs.example.org",
    }))
}

async fn submission_id() -> Json<Value> {
    Json(json!({"value": "0b6a9ab8-5a53-11ef-bb6b-0242ac110002"}))
}

async fn submit_delete(Json(doc): Json<Value>) -> Json<Value> {
    let task_id = if doc["DATA"][0]["path"] == "/fails" {
        FAILED_TASK
    } else {
        SUCCEEDED_TASK
    };
    Json(json!({"code": "Accepted", "task_id": task_id}))
}

fn transfer_service() -> MockService {
    MockService::start(
        Router::new()
            .route("/task/{task_id}", get(get_task))
            .route("/endpoint/{endpoint_id}", get(get_endpoint))
            .route("/endpoint/{endpoint_id}/autoactivate", post(autoactivate))
            .route("/submission_id", get(submission_id))
            .route("/delete", post(submit_delete)),
    )
}

#[test]
fn task_wait_exit_status() {
    let transfer = transfer_service();
    let dir = logged_in(&[TRANSFER_RS]);

    against(globus(dir.path()), &transfer)
        .args(["task", "wait", SUCCEEDED_TASK])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    against(globus(dir.path()), &transfer)
        .args(["task", "wait", SUCCEEDED_TASK, "-F", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "SUCCEEDED""#));

    against(globus(dir.path()), &transfer)
        .args(["task", "wait", FAILED_TASK])
        .assert()
        .code(1);

    against(globus(dir.path()), &transfer)
        .args(["task", "wait", ACTIVE_TASK, "--timeout", "1", "--timeout-exit-code", "50"])
        .assert()
        .code(50)
        .stderr(predicate::str::contains("Task has yet to complete after 1 seconds"));
}

#[test]
fn mapped_http_status() {
    let transfer = transfer_service();
    let dir = logged_in(&[TRANSFER_RS]);

    against(globus(dir.path()), &transfer)
        .args(["task", "show", MISSING_TASK])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("A Transfer API Error Occurred."))
        .stderr(predicate::str::contains("ClientError.NotFound"));

    against(globus(dir.path()), &transfer)
        .args(["--map-http-status", "404=50", "task", "show", MISSING_TASK])
        .assert()
        .code(50);
}

#[test]
fn rm_waits_for_the_delete_task() {
    let transfer = transfer_service();
    let dir = logged_in(&[TRANSFER_RS]);
    let target = format!("{SRC}:/data");

    against(globus(dir.path()), &transfer)
        .args(["rm", target.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::diff("Delete task succeeded\n"))
        .stderr(predicate::str::contains(format!(
            "Delete task submitted under ID \"{SUCCEEDED_TASK}\""
        )));

    against(globus(dir.path()), &transfer)
        .args(["rm", target.as_str(), "-F", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "SUCCEEDED""#))
        .stdout(predicate::str::contains("Delete task succeeded").not());

    let failing = format!("{SRC}:/fails");
    against(globus(dir.path()), &transfer)
        .args(["rm", failing.as_str()])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn failed_autoactivation_explains_how_to_activate() {
    let transfer = transfer_service();
    let dir = logged_in(&[TRANSFER_RS]);
    let target = format!("{DST}:/data");

    against(globus(dir.path()), &transfer)
        .args(["rm", target.as_str()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!(
            "The endpoint {DST} could not be auto-activated."
        )))
        .stderr(predicate::str::contains(
            "This endpoint supports the following activation methods: myproxy, delegate myproxy",
        ))
        .stderr(predicate::str::contains(format!(
            "'globus endpoint activate --myproxy {DST}'"
        )))
        .stderr(predicate::str::contains("--delegate-proxy X.509_PEM_FILE"));

    // skipping the check goes straight to submission
    against(globus(dir.path()), &transfer)
        .args(["rm", target.as_str(), "--skip-activation-check"])
        .assert()
        .success();
}

#[test]
fn gcs_commands_need_a_gcs_v5_endpoint() {
    let transfer = transfer_service();
    let dir = logged_in(&[AUTH_RS, TRANSFER_RS]);

    against(globus(dir.path()), &transfer)
        .args(["collection", "list", SRC])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(format!(
            "Expected {SRC} to be a Globus Connect Server v5 Endpoint."
        )))
        .stderr(predicate::str::contains(
            "Instead, found it was of type 'GCP_mapped_collection'.",
        ));

    against(globus(dir.path()), &transfer)
        .args(["collection", "list", DST])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("MISSING LOGIN ERROR"))
        .stderr(predicate::str::contains(format!("globus login --gcs {DST}")));
}

#[derive(Clone, Default)]
struct RefreshState {
    token_requests: Received<String>,
    authorizations: Received<String>,
}

async fn token_grant(State(state): State<RefreshState>, form: String) -> Json<Value> {
    state.token_requests.lock().unwrap().push(form);
    // no refresh_token, the stored one must survive
    Json(json!({
        "access_token": "fresh-transfer-access-token",
        "expires_in": 172800,
        "resource_server": TRANSFER_RS,
        "scope": "urn:globus:auth:scope:transfer.api.globus.org:all",
        "token_type": "Bearer",
    }))
}

async fn get_task_recording_auth(
    State(state): State<RefreshState>,
    headers: HeaderMap,
    task_id: Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    state.authorizations.lock().unwrap().push(auth);
    get_task(task_id).await
}

#[test]
fn expired_tokens_are_refreshed_and_written_back() {
    let state = RefreshState::default();
    let service = MockService::start(
        Router::new()
            .route("/v2/oauth2/token", post(token_grant))
            .route("/task/{task_id}", get(get_task_recording_auth))
            .with_state(state.clone()),
    );
    let dir = support::config_dir([token(TRANSFER_RS, 0)]);

    against(globus(dir.path()), &service)
        .args(["task", "show", SUCCEEDED_TASK, "-F", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(SUCCEEDED_TASK));

    let token_requests = state.token_requests.lock().unwrap().clone();
    assert_eq!(token_requests.len(), 1);
    assert!(token_requests[0].contains("grant_type=refresh_token"));
    assert!(token_requests[0].contains("refresh_token=transfer.api.globus.org-refresh-token"));

    assert_eq!(
        *state.authorizations.lock().unwrap(),
        vec!["Bearer fresh-transfer-access-token".to_owned()]
    );

    let stored = &stored_tokens(dir.path())[TRANSFER_RS];
    assert_eq!(stored["access_token"], "fresh-transfer-access-token");
    assert_eq!(stored["refresh_token"], "transfer.api.globus.org-refresh-token");
    assert!(stored["expires_at_seconds"].as_i64().unwrap() > 0);
}

#[derive(Clone)]
struct TimerState {
    job: Value,
    resumed: Received<Value>,
}

async fn get_job(State(state): State<TimerState>, Path(job_id): Path<String>) -> Json<Value> {
    let mut job = state.job.clone();
    job["job_id"] = json!(job_id);
    Json(job)
}

async fn resume_job(
    State(state): State<TimerState>,
    Path(job_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.resumed.lock().unwrap().push(body);
    Json(json!({"message": format!("Successfully resumed job {job_id}.")}))
}

fn timer_service(job: Value) -> (MockService, Received<Value>) {
    let resumed: Received<Value> = Arc::default();
    let state = TimerState {
        job,
        resumed: Arc::clone(&resumed),
    };
    let service = MockService::start(
        Router::new()
            .route("/jobs/{job_id}", get(get_job))
            .route("/jobs/{job_id}/resume", post(resume_job))
            .with_state(state),
    );
    (service, resumed)
}

#[test]
fn resuming_an_active_timer() {
    let (timer, resumed) = timer_service(json!({"status": "loaded"}));
    let dir = logged_in(&[AUTH_RS, TIMER_RS]);

    against(globus(dir.path()), &timer)
        .args(["timer", "resume", TIMER])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Successfully resumed job {TIMER}.")));

    assert_eq!(
        *resumed.lock().unwrap(),
        vec![json!({"update_credentials": false})]
    );
}

#[test]
fn resuming_a_timer_with_auth_requirements() {
    let (timer, resumed) = timer_service(json!({
        "status": "inactive",
        "inactive_reason": {
            "cause": "globus_auth_requirements",
            "detail": {
                "code": "AuthorizationRequired",
                "authorization_parameters": {
                    "session_message": "the timer's session expired",
                    "session_required_identities": ["c8aad43e-d274-11e5-bf98-8b02896cf782"],
                    "vendor_hint": "ignored",
                },
            },
        },
    }));
    let dir = logged_in(&[AUTH_RS, TIMER_RS]);

    against(globus(dir.path()), &timer)
        .args(["timer", "resume", TIMER])
        .assert()
        .code(4)
        .stderr(predicate::str::contains(
            "This timer has additional authentication requirements",
        ))
        .stderr(predicate::str::contains(format!(
            "globus timer resume --skip-inactive-reason-check {TIMER}"
        )));
    assert!(resumed.lock().unwrap().is_empty());

    against(globus(dir.path()), &timer)
        .args(["timer", "resume", TIMER, "--skip-inactive-reason-check"])
        .assert()
        .success();
    assert_eq!(
        *resumed.lock().unwrap(),
        vec![json!({"update_credentials": true})]
    );
}

async fn list_flows(
    State(markers): State<Received<Option<String>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let marker = query.get("marker").cloned();
    markers.lock().unwrap().push(marker.clone());

    let (ids, next): (&[u32], Option<&str>) = match marker.as_deref() {
        None => (&[1, 2][..], Some("m1")),
        Some("m1") => (&[3, 4][..], Some("m2")),
        _ => (&[5][..], None),
    };
    let flows: Vec<Value> = ids
        .iter()
        .map(|i| json!({"id": format!("flow-{i}"), "title": format!("Flow {i}")}))
        .collect();

    Json(json!({
        "flows": flows,
        "has_next_page": next.is_some(),
        "marker": next,
    }))
}

#[test]
fn flows_pages_stop_at_the_limit() {
    let markers: Received<Option<String>> = Arc::default();
    let flows = MockService::start(
        Router::new()
            .route("/flows", get(list_flows))
            .with_state(Arc::clone(&markers)),
    );
    let dir = logged_in(&[AUTH_RS, FLOWS_RS]);

    against(globus(dir.path()), &flows)
        .args(["flows", "list", "--limit", "3", "-F", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flow-3"))
        .stdout(predicate::str::contains("flow-4").not());
    assert_eq!(
        std::mem::take(&mut *markers.lock().unwrap()),
        vec![None, Some("m1".to_owned())]
    );

    against(globus(dir.path()), &flows)
        .args(["flows", "list", "-F", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flow-5"));
    assert_eq!(
        *markers.lock().unwrap(),
        vec![None, Some("m1".to_owned()), Some("m2".to_owned())]
    );
}
