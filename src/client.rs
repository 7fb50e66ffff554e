use crate::error::ApiError;
use anyhow::Context as _;
use reqwest::Method;
use serde_json::Value;

/// A bearer-authenticated client for one of the Globus services
#[derive(Clone)]
pub struct ServiceClient {
    service: String,
    base_url: String,
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn new(service: &str, base_url: &str, access_token: &str) -> anyhow::Result<Self> {
        let hm = {
            let mut hm = reqwest::header::HeaderMap::new();
            let mut auth = http::HeaderValue::from_str(&format!("Bearer {access_token}"))
                .context("access token is not a valid header value")?;
            auth.set_sensitive(true);
            hm.insert(http::header::AUTHORIZATION, auth);
            hm.insert(
                http::header::ACCEPT,
                http::HeaderValue::from_static("application/json"),
            );
            hm
        };

        let client = reqwest::Client::builder()
            .default_headers(hm)
            .user_agent(concat!("globus-cli-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build client")?;

        Ok(Self {
            service: service.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_owned()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::DELETE, path, &[], None).await
    }

    /// Sends a request, returning the decoded JSON body or an [`ApiError`]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> anyhow::Result<Value> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "sending {} request", self.service);

        let mut rb = self.client.request(method, &url);
        if !query.is_empty() {
            rb = rb.query(query);
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }

        let res = rb
            .send()
            .await
            .with_context(|| format!("failed to send request to {url}"))?;

        let code = res.status();
        let buffer = get_body(res).await?;
        tracing::debug!(status = code.as_u16(), len = buffer.len(), "received response");

        if !code.is_success() {
            return Err(ApiError::from_body(&self.service, code.as_u16(), &buffer).into());
        }

        if buffer.is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_slice(&buffer)
            .with_context(|| format!("failed to deserialize {} response body", self.service))
    }
}

async fn get_body(res: reqwest::Response) -> anyhow::Result<bytes::Bytes> {
    res.bytes().await.context("failed to receive body")
}
