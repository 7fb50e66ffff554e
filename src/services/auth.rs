use crate::client::ServiceClient;
use anyhow::Context as _;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Auth limits how many identities can be looked up in one request
const IDENTITY_BATCH_SIZE: usize = 100;

/// Identity ids resolved to their identity documents
#[derive(Default, Debug)]
pub struct IdentityMap {
    resolved: HashMap<String, Value>,
}

impl IdentityMap {
    /// Looks up the ids in batches, ignoring duplicates
    pub async fn resolve(
        auth: &ServiceClient,
        ids: impl IntoIterator<Item = String>,
    ) -> anyhow::Result<Self> {
        let ids: BTreeSet<String> = ids.into_iter().filter(|s| !s.is_empty()).collect();
        let ids: Vec<String> = ids.into_iter().collect();

        let mut resolved = HashMap::new();
        for chunk in ids.chunks(IDENTITY_BATCH_SIZE) {
            let res = auth
                .get("/v2/api/identities", &[("ids", chunk.join(","))])
                .await?;
            for identity in res
                .get("identities")
                .and_then(|i| i.as_array())
                .into_iter()
                .flatten()
            {
                if let Some(id) = identity.get("id").and_then(|i| i.as_str()) {
                    resolved.insert(id.to_owned(), identity.clone());
                }
            }
        }

        Ok(Self { resolved })
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.resolved.get(id)
    }

    /// The username of the identity, or the id itself if it is unknown
    pub fn username_or_id(&self, id: &str) -> String {
        self.get(id)
            .and_then(|i| i.get("username"))
            .and_then(|u| u.as_str())
            .unwrap_or(id)
            .to_owned()
    }
}

/// Resolves a username to its identity id, if Auth knows of it.
///
/// With `provision`, Auth creates the identity if it doesn't exist yet.
pub async fn lookup_identity_id(
    auth: &ServiceClient,
    username: &str,
    provision: bool,
) -> anyhow::Result<Option<String>> {
    let mut query = vec![("usernames", username.to_owned())];
    if provision {
        query.push(("provision", "true".to_owned()));
    }
    let res = auth.get("/v2/api/identities", &query).await?;

    Ok(res
        .get("identities")
        .and_then(|i| i.get(0))
        .and_then(|i| i.get("id"))
        .and_then(|i| i.as_str())
        .map(String::from))
}

/// A scope requirement with its dependent scopes, e.g. `a[b c[d]]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeTree {
    pub scope: String,
    pub dependencies: Vec<ScopeTree>,
}

/// Parses a scope string with optional bracketed dependencies
pub fn parse_scope_string(s: &str) -> anyhow::Result<Vec<ScopeTree>> {
    fn parse_level(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, depth: usize) -> anyhow::Result<Vec<ScopeTree>> {
        let mut out: Vec<ScopeTree> = Vec::new();
        let mut current = String::new();

        let flush = |current: &mut String, out: &mut Vec<ScopeTree>| {
            if !current.is_empty() {
                out.push(ScopeTree {
                    scope: current.trim_start_matches('*').to_owned(),
                    dependencies: Vec::new(),
                });
                current.clear();
            }
        };

        while let Some(c) = chars.next() {
            match c {
                '[' => {
                    flush(&mut current, &mut out);
                    let parent = out
                        .last_mut()
                        .context("scope string has dependencies without a parent scope")?;
                    parent.dependencies = parse_level(chars, depth + 1)?;
                }
                ']' => {
                    anyhow::ensure!(depth > 0, "scope string has an unbalanced ']'");
                    flush(&mut current, &mut out);
                    return Ok(out);
                }
                c if c.is_whitespace() => flush(&mut current, &mut out),
                c => current.push(c),
            }
        }

        anyhow::ensure!(depth == 0, "scope string has an unclosed '['");
        flush(&mut current, &mut out);
        Ok(out)
    }

    parse_level(&mut s.chars().peekable(), 0)
}

/// A single consent as returned by Auth
#[derive(serde::Deserialize, Clone, Debug)]
pub struct Consent {
    pub id: u64,
    pub scope_name: String,
    pub dependency_path: Vec<u64>,
}

/// All of the consents a user has granted
#[derive(Debug, Default)]
pub struct ConsentForest {
    consents: Vec<Consent>,
}

impl ConsentForest {
    pub fn new(consents: Vec<Consent>) -> Self {
        Self { consents }
    }

    fn meets_tree(&self, tree: &ScopeTree, parent_path: &[u64]) -> bool {
        self.consents
            .iter()
            .filter(|c| {
                c.scope_name == tree.scope
                    && c.dependency_path.len() == parent_path.len() + 1
                    && c.dependency_path.starts_with(parent_path)
            })
            .any(|c| {
                tree.dependencies
                    .iter()
                    .all(|dep| self.meets_tree(dep, &c.dependency_path))
            })
    }

    /// Whether the consents include every required scope, along with all of
    /// its dependent scopes
    pub fn contains_scopes(&self, required: &[String]) -> anyhow::Result<bool> {
        for scope in required {
            for tree in parse_scope_string(scope)? {
                if !self.meets_tree(&tree, &[]) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

pub async fn get_consents(auth: &ServiceClient, identity_id: &str) -> anyhow::Result<ConsentForest> {
    let res = auth
        .get(&format!("/v2/api/identities/{identity_id}/consents"), &[])
        .await?;

    let consents = res.get("consents").cloned().unwrap_or(Value::Array(Vec::new()));
    let consents: Vec<Consent> =
        serde_json::from_value(consents).context("failed to deserialize consents")?;
    Ok(ConsentForest::new(consents))
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        match <Option<OneOrMany> as serde::Deserialize>::deserialize(deserializer)? {
            None => None,
            Some(OneOrMany::One(s)) => Some(s.split(',').map(|s| s.trim().to_owned()).collect()),
            Some(OneOrMany::Many(v)) => Some(v),
        },
    )
}

/// What a user must do in Globus Auth before an operation can proceed
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct AuthorizationParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_required_identities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_required_policies: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_required_single_domain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_required_mfa: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AuthorizationParameters {
    /// The names of the known parameters that are set. Parameters this
    /// client does not recognize are carried in `extra` but never count as
    /// requirements.
    pub fn set_keys(&self) -> BTreeSet<String> {
        [
            ("session_message", self.session_message.is_some()),
            (
                "session_required_identities",
                self.session_required_identities.is_some(),
            ),
            (
                "session_required_policies",
                self.session_required_policies.is_some(),
            ),
            (
                "session_required_single_domain",
                self.session_required_single_domain.is_some(),
            ),
            ("session_required_mfa", self.session_required_mfa.is_some()),
            ("required_scopes", self.required_scopes.is_some()),
            ("prompt", self.prompt.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(key, _)| key.to_owned())
        .collect()
    }
}

/// A Globus Auth Requirements Error (GARE)
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
pub struct AuthRequirements {
    pub code: String,
    pub authorization_parameters: AuthorizationParameters,
}

impl AuthRequirements {
    /// Interprets an error document as a GARE, accepting the legacy
    /// `ConsentRequired` shape as well
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("authorization_parameters").is_some() {
            return serde_json::from_value(value.clone()).ok();
        }

        if value.get("code").and_then(|c| c.as_str()) == Some("ConsentRequired") {
            let scopes: Vec<String> =
                serde_json::from_value(value.get("required_scopes")?.clone()).ok()?;
            return Some(Self {
                code: "ConsentRequired".to_owned(),
                authorization_parameters: AuthorizationParameters {
                    required_scopes: Some(scopes),
                    session_message: value
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(String::from),
                    ..Default::default()
                },
            });
        }

        None
    }
}
