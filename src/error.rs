use crate::{parsing::HttpStatusMap, services::auth::AuthRequirements};
use nu_ansi_term::Color;
use std::{fmt, io::IsTerminal as _};

/// A non-2xx response from one of the Globus services
#[derive(Debug, thiserror::Error)]
#[error("{service} API error ({http_status}): {code}: {message}")]
pub struct ApiError {
    pub service: String,
    pub http_status: u16,
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
    pub raw: serde_json::Value,
}

impl ApiError {
    /// Builds an error from a response body, pulling the `code` and `message`
    /// out of the various error document shapes the services use
    pub fn from_body(service: &str, http_status: u16, body: &[u8]) -> Self {
        let raw: serde_json::Value = serde_json::from_slice(body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
        });

        let first_error = raw.get("errors").and_then(|e| e.get(0));
        let lookup = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| {
                raw.get(*k)
                    .or_else(|| first_error.and_then(|e| e.get(*k)))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
        };

        let code = lookup(&["code"]).unwrap_or_else(|| "Error".to_owned());
        let message = lookup(&["message", "detail", "error_description"]).unwrap_or_else(|| {
            match &raw {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        });
        let request_id = lookup(&["request_id"]);

        Self {
            service: service.to_owned(),
            http_status,
            code,
            message,
            request_id,
            raw,
        }
    }
}

/// Raised when cross-option validation fails after argument parsing
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Shorthand for bailing out with a [`UsageError`]
#[macro_export]
macro_rules! usage_error {
    ($($arg:tt)*) => {
        return Err($crate::error::UsageError(format!($($arg)*)).into())
    };
}

/// Ends the process with a specific status once the command's output has
/// already been printed
#[derive(Debug, thiserror::Error)]
#[error("exiting with status {0}")]
pub struct ExitStatus(pub i32);

/// Raised when a command needs tokens that are not in storage
#[derive(Debug, thiserror::Error)]
pub struct MissingLoginError {
    pub resource_servers: Vec<String>,
    pub login_hint: String,
}

impl MissingLoginError {
    pub fn new(resource_servers: Vec<String>) -> Self {
        Self {
            resource_servers,
            login_hint: "globus login".to_owned(),
        }
    }
}

impl fmt::Display for MissingLoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let servers = self.resource_servers.join(", ");
        if self.resource_servers.len() == 1 {
            write!(f, "Missing login for {servers}, please run:")?;
        } else {
            write!(f, "Missing logins for {servers}, please run:")?;
        }
        write!(f, "\n\n  {}\n", self.login_hint)
    }
}

/// A Globus Auth requirements error detected by the CLI itself, carrying
/// the requirements the user must satisfy before retrying
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AuthRequirementsError {
    pub message: String,
    pub requirements: AuthRequirements,
    pub epilog: Option<String>,
}

impl AuthRequirementsError {
    fn remediation(&self) -> String {
        let params = &self.requirements.authorization_parameters;
        let mut out = String::new();

        if let Some(scopes) = params.required_scopes.as_ref().filter(|s| !s.is_empty()) {
            out.push_str("Please run:\n\n  globus session consent");
            for scope in scopes {
                out.push_str(&format!(" '{scope}'"));
            }
            out.push_str("\n\nto login with the required scopes.\n");
        }

        let mut update = Vec::new();
        for id in params.session_required_identities.iter().flatten() {
            update.push(id.clone());
        }
        let mut flags = Vec::new();
        if let Some(domains) = params
            .session_required_single_domain
            .as_ref()
            .filter(|d| !d.is_empty())
        {
            flags.push(format!("--all --domain '{}'", domains.join(",")));
        }
        if let Some(policies) = params
            .session_required_policies
            .as_ref()
            .filter(|p| !p.is_empty())
        {
            flags.push(format!("--policy '{}'", policies.join(",")));
        }

        if !update.is_empty() || !flags.is_empty() {
            out.push_str("Please run:\n\n  globus session update");
            for id in update {
                out.push(' ');
                out.push_str(&id);
            }
            for flag in flags {
                out.push(' ');
                out.push_str(&flag);
            }
            out.push_str("\n\nto re-authenticate with the required identities.\n");
        }

        out
    }
}

fn heading(text: &str) -> String {
    if std::io::stderr().is_terminal() {
        Color::Yellow.bold().paint(text).to_string()
    } else {
        text.to_owned()
    }
}

/// Prints the error to stderr and returns the exit status to use
pub fn report(err: &anyhow::Error, status_map: &HttpStatusMap) -> i32 {
    if let Some(ExitStatus(code)) = err.downcast_ref::<ExitStatus>() {
        return *code;
    }

    if let Some(usage) = err.downcast_ref::<UsageError>() {
        eprintln!("{} {usage}", heading("Error:"));
        return 2;
    }

    if let Some(api) = err.downcast_ref::<ApiError>() {
        eprintln!("{}", heading(&format!("A {} API Error Occurred.", api.service)));
        eprintln!("HTTP status:      {}", api.http_status);
        if let Some(request_id) = &api.request_id {
            eprintln!("request_id:       {request_id}");
        }
        eprintln!("code:             {}", api.code);
        eprintln!("message:          {}", api.message);
        return status_map.exit_code(api.http_status).unwrap_or(1);
    }

    if let Some(missing) = err.downcast_ref::<MissingLoginError>() {
        eprintln!("{} {missing}", heading("MISSING LOGIN ERROR:"));
        return 1;
    }

    if let Some(gare) = err.downcast_ref::<AuthRequirementsError>() {
        eprintln!("{}", heading(&gare.message));
        if let Some(msg) = &gare.requirements.authorization_parameters.session_message {
            eprintln!("message: {msg}");
        }
        eprintln!();
        eprint!("{}", gare.remediation());
        if let Some(epilog) = &gare.epilog {
            eprintln!("\n{epilog}");
        }
        return 4;
    }

    eprintln!("{} {err:#}", heading("Error:"));
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_error_document() {
        let body = br#"{"code": "ClientError.NotFound", "message": "Task not found", "request_id": "abc123"}"#;
        let err = ApiError::from_body("Transfer", 404, body);
        assert_eq!(err.code, "ClientError.NotFound");
        assert_eq!(err.message, "Task not found");
        assert_eq!(err.request_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn errors_array_document() {
        let body = br#"{"errors": [{"code": "FORBIDDEN", "detail": "nope"}]}"#;
        let err = ApiError::from_body("Auth", 403, body);
        assert_eq!(err.code, "FORBIDDEN");
        assert_eq!(err.message, "nope");
        assert!(err.request_id.is_none());
    }

    #[test]
    fn non_json_body() {
        let err = ApiError::from_body("Search", 502, b"Bad Gateway");
        assert_eq!(err.code, "Error");
        assert_eq!(err.message, "Bad Gateway");
    }

    #[test]
    fn missing_login_message() {
        let err = MissingLoginError::new(vec!["transfer.api.globus.org".into()]);
        assert_eq!(
            err.to_string(),
            "Missing login for transfer.api.globus.org, please run:\n\n  globus login\n"
        );
    }

    #[test]
    fn usage_errors_exit_2() {
        let err: anyhow::Error = UsageError("bad".into()).into();
        assert_eq!(report(&err, &HttpStatusMap::default()), 2);
    }

    #[test]
    fn exit_status_is_silent() {
        let err: anyhow::Error = ExitStatus(51).into();
        assert_eq!(report(&err, &HttpStatusMap::default()), 51);
    }

    #[test]
    fn api_errors_use_status_map() {
        let map: HttpStatusMap = "404=50".parse().unwrap();
        let err: anyhow::Error = ApiError::from_body("Transfer", 404, b"{}").into();
        assert_eq!(report(&err, &map), 50);
        let err: anyhow::Error = ApiError::from_body("Transfer", 500, b"{}").into();
        assert_eq!(report(&err, &map), 1);
    }
}
