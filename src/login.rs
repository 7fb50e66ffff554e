pub mod flow;
pub mod scopes;
pub mod tokenstore;

use crate::{
    client::ServiceClient,
    config::{Config, Service, NATIVE_CLIENT_ID},
    error::MissingLoginError,
};
use anyhow::Context as _;
use flow::AuthLoginClient;
use tokenstore::{TokenData, TokenStore};

/// Refresh access tokens this many seconds before they expire
const EXPIRY_SLACK_SECS: i64 = 60;

/// Whether the CLI appears to be running over SSH, in which case a local
/// redirect server is of no use to the user's browser
pub fn is_remote_session() -> bool {
    ["SSH_TTY", "SSH_CONNECTION"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

/// Looks up, refreshes and hands out tokens for the services commands talk to
pub struct LoginManager {
    config: Config,
    store: tokio::sync::Mutex<TokenStore>,
}

impl LoginManager {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let namespace = match &config.client_credentials {
            Some(creds) => format!(
                "clientprofile/{}/{}",
                config.environment, creds.client_id
            ),
            None => format!("userprofile/{}", config.environment),
        };
        let store = TokenStore::open(&config.storage_dir, namespace)?;

        Ok(Self {
            config,
            store: tokio::sync::Mutex::new(store),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_client_login(&self) -> bool {
        self.config.client_credentials.is_some()
    }

    /// The OAuth2 client used for grants, refreshes and revocations
    pub fn login_client(&self) -> AuthLoginClient {
        let base = self.config.base_url(Service::Auth);
        match &self.config.client_credentials {
            Some(creds) => {
                AuthLoginClient::new(&base, &creds.client_id, Some(&creds.client_secret))
            }
            None => AuthLoginClient::new(&base, NATIVE_CLIENT_ID, None),
        }
    }

    fn token_satisfies(token: &TokenData, resource_server: &str) -> bool {
        scopes::scope_string_covers(&token.scope, &scopes::required_scopes(resource_server))
    }

    /// Whether storage holds a usable token for the resource server
    pub async fn has_login(&self, resource_server: &str) -> bool {
        let store = self.store.lock().await;
        store
            .get(resource_server)
            .is_some_and(|t| Self::token_satisfies(t, resource_server))
    }

    /// Ensures every resource server has a stored token, failing with a
    /// [`MissingLoginError`] naming the ones that don't.
    ///
    /// Client logins fetch any missing tokens instead of failing.
    pub async fn assert_logins(&self, resource_servers: &[&str]) -> anyhow::Result<()> {
        let mut missing = Vec::new();
        for rs in resource_servers {
            if !self.has_login(rs).await {
                missing.push((*rs).to_owned());
            }
        }

        if missing.is_empty() {
            return Ok(());
        }

        if self.is_client_login() {
            let scopes: Vec<String> = missing
                .iter()
                .flat_map(|rs| scopes::request_scopes(rs))
                .collect();
            let tokens = self.login_client().client_credentials(&scopes).await?;
            self.store.lock().await.store(tokens.into_token_data())?;
            return Ok(());
        }

        Err(MissingLoginError::new(missing).into())
    }

    /// Returns a valid access token for the resource server, refreshing it
    /// first if it is about to expire
    async fn access_token(&self, resource_server: &str) -> anyhow::Result<String> {
        let mut store = self.store.lock().await;

        let Some(token) = store.get(resource_server).cloned() else {
            drop(store);
            self.assert_logins(&[resource_server]).await?;
            store = self.store.lock().await;
            return store
                .get(resource_server)
                .map(|t| t.access_token.clone())
                .ok_or_else(|| MissingLoginError::new(vec![resource_server.to_owned()]).into());
        };

        if !token.expires_within(EXPIRY_SLACK_SECS) {
            return Ok(token.access_token);
        }

        tracing::debug!(resource_server, "access token is expiring, refreshing");
        let login_client = self.login_client();
        let fresh = if self.is_client_login() {
            login_client
                .client_credentials(&scopes::request_scopes(resource_server))
                .await?
        } else {
            let refresh_token = token
                .refresh_token
                .as_deref()
                .ok_or_else(|| MissingLoginError::new(vec![resource_server.to_owned()]))?;
            login_client
                .refresh(refresh_token)
                .await
                .context("failed to refresh access token")?
        };

        let fresh = fresh.into_token_data();
        let access_token = fresh
            .iter()
            .find(|t| t.resource_server == resource_server)
            .map(|t| t.access_token.clone())
            .context("token refresh did not return a token for the resource server")?;

        // refresh responses may omit the refresh token, keep the old one
        let fresh = fresh.into_iter().map(|mut t| {
            if t.refresh_token.is_none() && t.resource_server == resource_server {
                t.refresh_token = token.refresh_token.clone();
            }
            t
        });
        store.store(fresh)?;

        Ok(access_token)
    }

    async fn service_client(
        &self,
        service: Service,
        resource_server: &str,
    ) -> anyhow::Result<ServiceClient> {
        let token = self.access_token(resource_server).await?;
        ServiceClient::new(
            service.display_name(),
            &self.config.base_url(service),
            &token,
        )
    }

    pub async fn get_auth_client(&self) -> anyhow::Result<ServiceClient> {
        self.service_client(Service::Auth, scopes::AUTH_RS).await
    }

    pub async fn get_transfer_client(&self) -> anyhow::Result<ServiceClient> {
        self.service_client(Service::Transfer, scopes::TRANSFER_RS)
            .await
    }

    pub async fn get_search_client(&self) -> anyhow::Result<ServiceClient> {
        self.service_client(Service::Search, scopes::SEARCH_RS).await
    }

    pub async fn get_timer_client(&self) -> anyhow::Result<ServiceClient> {
        self.service_client(Service::Timer, scopes::TIMER_RS).await
    }

    pub async fn get_flows_client(&self) -> anyhow::Result<ServiceClient> {
        self.service_client(Service::Flows, scopes::FLOWS_RS).await
    }

    /// A client for the Globus Connect Server manager of a GCSv5 endpoint
    pub async fn get_gcs_client(&self, endpoint_id: &uuid::Uuid) -> anyhow::Result<ServiceClient> {
        let transfer = self.get_transfer_client().await?;
        let manager_url = crate::services::gcs::manager_url(&transfer, endpoint_id).await?;

        let rs = endpoint_id.to_string();
        if !self.is_client_login() && !self.has_login(&rs).await {
            let mut err = MissingLoginError::new(vec![rs.clone()]);
            err.login_hint = format!("globus login --gcs {rs}");
            return Err(err.into());
        }

        let token = self.access_token(&rs).await?;
        ServiceClient::new("GCS", &manager_url, &token)
    }

    /// The primary identity id of the logged in user
    pub async fn get_current_identity_id(&self) -> anyhow::Result<String> {
        if let Some(id) = self.store.lock().await.identity_id() {
            return Ok(id.to_owned());
        }

        let auth = self.get_auth_client().await?;
        let userinfo = auth.get("/v2/oauth2/userinfo", &[]).await?;
        let sub = userinfo
            .get("sub")
            .and_then(|s| s.as_str())
            .context("userinfo response did not contain 'sub'")?
            .to_owned();

        self.store.lock().await.set_identity_id(sub.clone())?;
        Ok(sub)
    }

    /// Stores the tokens of a completed login and records the user's identity
    pub async fn store_login(&self, tokens: flow::TokenResponse) -> anyhow::Result<()> {
        let tokens = tokens.into_token_data();
        let auth_token = tokens
            .iter()
            .find(|t| t.resource_server == scopes::AUTH_RS)
            .map(|t| t.access_token.clone());

        self.store.lock().await.store(tokens)?;

        if let Some(token) = auth_token {
            let auth = ServiceClient::new(
                Service::Auth.display_name(),
                &self.config.base_url(Service::Auth),
                &token,
            )?;
            match auth.get("/v2/oauth2/userinfo", &[]).await {
                Ok(userinfo) => {
                    if let Some(sub) = userinfo.get("sub").and_then(|s| s.as_str()) {
                        self.store.lock().await.set_identity_id(sub.to_owned())?;
                    }
                }
                Err(err) => tracing::warn!("unable to look up identity after login: {err:#}"),
            }
        }

        Ok(())
    }

    /// Revokes and removes every stored token, returning how many were removed
    pub async fn logout(&self) -> anyhow::Result<usize> {
        let mut store = self.store.lock().await;
        let removed = store.clear()?;

        let login_client = self.login_client();
        for token in &removed {
            let revocations = std::iter::once(&token.access_token).chain(token.refresh_token.iter());
            for t in revocations {
                if let Err(err) = login_client.revoke(t).await {
                    tracing::warn!(
                        resource_server = %token.resource_server,
                        "failed to revoke token: {err:#}"
                    );
                }
            }
        }

        Ok(removed.len())
    }
}
