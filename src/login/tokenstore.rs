use anyhow::Context as _;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

const STORAGE_FILE: &str = "storage.json";

/// A token for a single resource server, as kept on disk
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenData {
    pub resource_server: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at_seconds: i64,
    pub scope: String,
    pub token_type: String,
}

impl TokenData {
    /// Whether the access token expires within `secs` of now
    pub fn expires_within(&self, secs: i64) -> bool {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.expires_at_seconds - now < secs
    }
}

#[derive(serde::Serialize, serde::Deserialize, Default, Debug)]
struct Namespace {
    #[serde(default)]
    tokens: BTreeMap<String, TokenData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity_id: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Default, Debug)]
struct StorageFile {
    #[serde(default)]
    namespaces: BTreeMap<String, Namespace>,
}

/// JSON file backed token storage, split into one namespace per
/// environment and login kind
pub struct TokenStore {
    path: PathBuf,
    namespace: String,
    data: StorageFile,
}

impl TokenStore {
    pub fn open(dir: &Path, namespace: impl Into<String>) -> anyhow::Result<Self> {
        let path = dir.join(STORAGE_FILE);
        let namespace = namespace.into();

        let data = match std::fs::read(&path) {
            Ok(buf) => serde_json::from_slice(&buf)
                .with_context(|| format!("token storage {} is corrupt", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StorageFile::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("unable to read {}", path.display()))
            }
        };

        tracing::debug!(path = %path.display(), %namespace, "opened token storage");

        Ok(Self {
            path,
            namespace,
            data,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn ns(&self) -> Option<&Namespace> {
        self.data.namespaces.get(&self.namespace)
    }

    fn ns_mut(&mut self) -> &mut Namespace {
        self.data
            .namespaces
            .entry(self.namespace.clone())
            .or_default()
    }

    pub fn get(&self, resource_server: &str) -> Option<&TokenData> {
        self.ns().and_then(|ns| ns.tokens.get(resource_server))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenData> {
        self.ns().into_iter().flat_map(|ns| ns.tokens.values())
    }

    pub fn identity_id(&self) -> Option<&str> {
        self.ns().and_then(|ns| ns.identity_id.as_deref())
    }

    pub fn set_identity_id(&mut self, id: String) -> anyhow::Result<()> {
        self.ns_mut().identity_id = Some(id);
        self.save()
    }

    /// Stores (or replaces) tokens, keyed by their resource server
    pub fn store(&mut self, tokens: impl IntoIterator<Item = TokenData>) -> anyhow::Result<()> {
        let ns = self.ns_mut();
        for token in tokens {
            tracing::debug!(resource_server = %token.resource_server, "storing token");
            ns.tokens.insert(token.resource_server.clone(), token);
        }
        self.save()
    }

    /// Drops every token and the identity id in the current namespace
    pub fn clear(&mut self) -> anyhow::Result<Vec<TokenData>> {
        let removed = self
            .data
            .namespaces
            .remove(&self.namespace)
            .map(|ns| ns.tokens.into_values().collect())
            .unwrap_or_default();
        self.save()?;
        Ok(removed)
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let serialized =
            serde_json::to_vec_pretty(&self.data).context("failed to serialize tokens")?;

        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &serialized)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write as _;
    use std::os::unix::fs::OpenOptionsExt as _;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
