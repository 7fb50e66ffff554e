use anyhow::Context as _;
use std::{fmt, path::PathBuf, str::FromStr};

/// The client id of the Globus CLI native app, used for user logins
pub const NATIVE_CLIENT_ID: &str = "95fdeba8-fac2-42bd-a357-e068d82ff78e";

/// Globus deployment the CLI talks to, selected via `GLOBUS_SDK_ENVIRONMENT`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Preview,
    Sandbox,
    Test,
    Integration,
    Staging,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Preview => "preview",
            Self::Sandbox => "sandbox",
            Self::Test => "test",
            Self::Integration => "integration",
            Self::Staging => "staging",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "production" | "prod" | "default" => Self::Production,
            "preview" => Self::Preview,
            "sandbox" => Self::Sandbox,
            "test" => Self::Test,
            "integration" => Self::Integration,
            "staging" => Self::Staging,
            other => anyhow::bail!("unknown Globus environment '{other}'"),
        })
    }
}

/// The web services the CLI sends requests to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    Transfer,
    Search,
    Timer,
    Flows,
}

impl Service {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Auth => "Auth",
            Self::Transfer => "Transfer",
            Self::Search => "Search",
            Self::Timer => "Timer",
            Self::Flows => "Flows",
        }
    }

    fn env_var(self) -> &'static str {
        match self {
            Self::Auth => "GLOBUS_SDK_SERVICE_URL_AUTH",
            Self::Transfer => "GLOBUS_SDK_SERVICE_URL_TRANSFER",
            Self::Search => "GLOBUS_SDK_SERVICE_URL_SEARCH",
            Self::Timer => "GLOBUS_SDK_SERVICE_URL_TIMER",
            Self::Flows => "GLOBUS_SDK_SERVICE_URL_FLOWS",
        }
    }

    /// The base URL of the service in the given environment, honoring any
    /// `GLOBUS_SDK_SERVICE_URL_*` override
    pub fn base_url(self, env: Environment) -> String {
        if let Ok(url) = std::env::var(self.env_var()) {
            if !url.is_empty() {
                return url;
            }
        }

        default_base_url(self, env)
    }
}

fn default_base_url(service: Service, env: Environment) -> String {
    let (prefix, suffix) = match service {
        Service::Auth => ("auth", ""),
        Service::Transfer => ("transfer.api", "/v0.10"),
        Service::Search => ("search.api", ""),
        Service::Timer => ("timer.automate", ""),
        Service::Flows => ("flows", ""),
    };

    match env {
        Environment::Production => format!("https://{prefix}.globus.org{suffix}"),
        Environment::Preview => format!("https://{prefix}.preview.globus.org{suffix}"),
        other => {
            let env = other.as_str();
            match service {
                Service::Timer => format!("https://{env}.timer.automate.globuscs.info"),
                Service::Flows => format!("https://{env}.flows.automate.globuscs.info"),
                _ => format!("https://{prefix}.{env}.globuscs.info{suffix}"),
            }
        }
    }
}

/// Client credentials for running the CLI as a confidential client
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Runtime configuration, resolved from the environment
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub client_credentials: Option<ClientCredentials>,
    pub storage_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = match std::env::var("GLOBUS_SDK_ENVIRONMENT") {
            Ok(s) if !s.is_empty() => s.parse()?,
            _ => Environment::default(),
        };

        let client_credentials = client_credentials_from(
            std::env::var("GLOBUS_CLI_CLIENT_ID").ok(),
            std::env::var("GLOBUS_CLI_CLIENT_SECRET").ok(),
        )?;

        let storage_dir = match std::env::var_os("GLOBUS_CLI_CONFIG_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .context("unable to determine the home directory")?
                .join(".globus")
                .join("cli"),
        };

        Ok(Self {
            environment,
            client_credentials,
            storage_dir,
        })
    }

    pub fn base_url(&self, service: Service) -> String {
        service.base_url(self.environment)
    }
}

fn client_credentials_from(
    id: Option<String>,
    secret: Option<String>,
) -> anyhow::Result<Option<ClientCredentials>> {
    let id = id.filter(|s| !s.is_empty());
    let secret = secret.filter(|s| !s.is_empty());

    match (id, secret) {
        (Some(client_id), Some(client_secret)) => Ok(Some(ClientCredentials {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => anyhow::bail!(
            "GLOBUS_CLI_CLIENT_ID is set but GLOBUS_CLI_CLIENT_SECRET is not; both must be set to use client credentials"
        ),
        (None, Some(_)) => anyhow::bail!(
            "GLOBUS_CLI_CLIENT_SECRET is set but GLOBUS_CLI_CLIENT_ID is not; both must be set to use client credentials"
        ),
    }
}
