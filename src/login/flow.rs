use super::tokenstore::TokenData;
use crate::error::ApiError;
use anyhow::Context as _;
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use base64::Engine as _;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    io::AsyncBufReadExt as _,
    sync::{mpsc, oneshot},
};

/// How long the local redirect server waits for the browser
const LOCAL_SERVER_TIMEOUT: Duration = Duration::from_secs(300);

/// A token grant as returned by `/v2/oauth2/token`
#[derive(serde::Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub resource_server: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    #[serde(default)]
    pub other_tokens: Vec<TokenResponse>,
}

fn bearer() -> String {
    "Bearer".to_owned()
}

impl TokenResponse {
    /// Flattens the main grant and all `other_tokens` into storable tokens
    pub fn into_token_data(self) -> Vec<TokenData> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let mut out = Vec::with_capacity(1 + self.other_tokens.len());

        let mut pending = vec![self];
        while let Some(mut tr) = pending.pop() {
            pending.append(&mut tr.other_tokens);
            out.push(TokenData {
                resource_server: tr.resource_server,
                access_token: tr.access_token,
                refresh_token: tr.refresh_token,
                expires_at_seconds: now + tr.expires_in,
                scope: tr.scope,
                token_type: tr.token_type,
            });
        }

        out
    }
}

/// Proof Key for Code Exchange values for a single authorization
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> anyhow::Result<Self> {
        let verifier = random_urlsafe(32)?;
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

fn challenge_for(verifier: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_ref())
}

fn random_urlsafe(len: usize) -> anyhow::Result<String> {
    use ring::rand::SecureRandom as _;

    let mut buf = vec![0u8; len];
    ring::rand::SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| anyhow::anyhow!("failed to generate random bytes"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Unauthenticated (or client-authenticated) calls to the Auth OAuth2 endpoints
pub struct AuthLoginClient {
    base_url: String,
    client_id: String,
    client_secret: Option<String>,
    client: reqwest::Client,
}

impl AuthLoginClient {
    pub fn new(base_url: &str, client_id: &str, client_secret: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client_id: client_id.to_owned(),
            client_secret: client_secret.map(String::from),
            client: reqwest::Client::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn oauth2_post(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> anyhow::Result<bytes::Bytes> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "sending oauth2 request");

        let mut rb = self.client.post(&url);
        let mut form = form.to_vec();
        match &self.client_secret {
            Some(secret) => rb = rb.basic_auth(&self.client_id, Some(secret)),
            None => form.push(("client_id", &self.client_id)),
        }

        let res = rb
            .form(&form)
            .send()
            .await
            .context("failed to send token request")?;

        let code = res.status();
        let buffer = res.bytes().await.context("failed to receive body")?;

        if !code.is_success() {
            return Err(ApiError::from_body("Auth", code.as_u16(), &buffer).into());
        }

        Ok(buffer)
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> anyhow::Result<TokenResponse> {
        let buffer = self.oauth2_post("/v2/oauth2/token", form).await?;
        serde_json::from_slice(&buffer).context("failed to deserialize token response")
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> anyhow::Result<TokenResponse> {
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> anyhow::Result<TokenResponse> {
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    pub async fn client_credentials(&self, scopes: &[String]) -> anyhow::Result<TokenResponse> {
        let scope = scopes.join(" ");
        self.token_grant(&[("grant_type", "client_credentials"), ("scope", &scope)])
            .await
    }

    pub async fn revoke(&self, token: &str) -> anyhow::Result<()> {
        self.oauth2_post("/v2/oauth2/token/revoke", &[("token", token)])
            .await?;
        Ok(())
    }

    /// Builds the URL the user visits to authorize the CLI
    pub fn authorize_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        pkce: &Pkce,
        state: &str,
        extra: &[(String, String)],
    ) -> anyhow::Result<url::Url> {
        let mut url = url::Url::parse(&format!("{}/v2/oauth2/authorize", self.base_url))
            .context("invalid auth URL")?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &scopes.join(" "))
                .append_pair("state", state)
                .append_pair("response_type", "code")
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", "S256")
                .append_pair("access_type", "offline")
                .append_pair("prompt", "login");
            for (k, v) in extra {
                query.append_pair(k, v);
            }
        }

        Ok(url)
    }

    /// Runs a native app login, returning the granted tokens
    pub async fn run_login_flow(
        &self,
        scopes: &[String],
        no_local_server: bool,
        extra: &[(String, String)],
    ) -> anyhow::Result<TokenResponse> {
        let pkce = Pkce::generate()?;
        let state = random_urlsafe(16)?;

        if no_local_server {
            let redirect_uri = format!("{}/v2/web/auth-code", self.base_url);
            let url = self.authorize_url(&redirect_uri, scopes, &pkce, &state, extra)?;

            println!("Please authenticate with Globus here:");
            println!("------------------------------------");
            println!("{url}");
            println!("------------------------------------\n");

            let code = prompt("Enter the resulting Authorization Code here: ").await?;
            anyhow::ensure!(!code.is_empty(), "no authorization code was entered");

            return self.exchange_code(&code, &pkce.verifier, &redirect_uri).await;
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to start local login server")?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}");
        let url = self.authorize_url(&redirect_uri, scopes, &pkce, &state, extra)?;

        println!("Please authenticate with Globus here:");
        println!("------------------------------------");
        println!("{url}");
        println!("------------------------------------\n");
        println!("Waiting for the login to complete in your browser...");

        let code = tokio::time::timeout(LOCAL_SERVER_TIMEOUT, accept_redirect(listener, &state))
            .await
            .context("timed out waiting for the login to complete")??;

        self.exchange_code(&code, &pkce.verifier, &redirect_uri)
            .await
    }
}

async fn prompt(msg: &str) -> anyhow::Result<String> {
    use std::io::Write as _;

    print!("{msg}");
    std::io::stdout().flush()?;

    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read from stdin")?;
    Ok(line.trim().to_owned())
}

const LOGIN_SUCCEEDED: &str = "Login successful. You may close this window and return to the CLI.";
const LOGIN_FAILED: &str = "Login failed. Please return to the CLI for details.";
const LOGIN_PENDING: &str = "Waiting for the Globus login redirect.";

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    result: mpsc::Sender<anyhow::Result<String>>,
}

/// Serves the redirect URI until a request carrying an authorization code or
/// an error arrives. Anything else the browser sends first, such as
/// preconnects or a favicon lookup, is answered and otherwise ignored.
async fn accept_redirect(
    listener: tokio::net::TcpListener,
    state: &str,
) -> anyhow::Result<String> {
    let (tx, mut rx) = mpsc::channel(1);
    let app = Router::new()
        .route("/", get(redirect_handler))
        .with_state(RedirectState {
            expected_state: state.into(),
            result: tx,
        });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            tracing::debug!(%err, "login redirect server stopped");
        }
    });

    let result = rx
        .recv()
        .await
        .context("login redirect server stopped before the login completed")?;
    // Lets the response to the redirect finish before the server goes away
    let _ = shutdown_tx.send(());
    result
}

async fn redirect_handler(
    State(redirect): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> &'static str {
    let Some(result) = redirect_result(&params, &redirect.expected_state) else {
        tracing::debug!(?params, "ignoring request without a login result");
        return LOGIN_PENDING;
    };

    let body = if result.is_ok() {
        LOGIN_SUCCEEDED
    } else {
        LOGIN_FAILED
    };
    // Only the first result is used
    let _ = redirect.result.try_send(result);
    body
}

/// The login result carried by the query of a redirect, `None` when it holds
/// neither a code nor an error
fn redirect_result(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Option<anyhow::Result<String>> {
    if let Some(error) = params.get("error") {
        return Some(Err(match params.get("error_description") {
            Some(description) => anyhow::anyhow!("login failed: {error}: {description}"),
            None => anyhow::anyhow!("login failed: {error}"),
        }));
    }

    let code = params.get("code")?;
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Some(Err(anyhow::anyhow!(
            "login redirect state did not match, refusing to continue"
        )));
    }

    Some(Ok(code.clone()))
}
