use std::fmt;

/// An `ENDPOINT_ID[:PATH]` argument
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointPath {
    pub endpoint_id: uuid::Uuid,
    pub path: Option<String>,
}

impl fmt::Display for EndpointPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{path}", self.endpoint_id),
            None => write!(f, "{}", self.endpoint_id),
        }
    }
}

fn split(value: &str) -> Result<EndpointPath, String> {
    let (id, path) = match value.split_once(':') {
        Some((id, path)) => (id, Some(path)),
        None => (value, None),
    };

    let endpoint_id = uuid::Uuid::parse_str(id).map_err(|_| {
        format!("'{value}' does not start with a valid endpoint ID (expected ENDPOINT_ID[:PATH])")
    })?;

    Ok(EndpointPath {
        endpoint_id,
        path: path.filter(|p| !p.is_empty()).map(String::from),
    })
}

/// `ENDPOINT_ID[:PATH]`, where the path may be omitted
pub fn parse_endpoint_plus_optpath(value: &str) -> Result<EndpointPath, String> {
    split(value)
}

/// `ENDPOINT_ID:PATH`, where the path is required
pub fn parse_endpoint_plus_reqpath(value: &str) -> Result<EndpointPath, String> {
    let ep = split(value)?;
    if ep.path.is_none() {
        return Err(format!(
            "'{value}' is missing a path (expected ENDPOINT_ID:PATH)"
        ));
    }
    Ok(ep)
}

/// Joins a batch path onto an optional command line prefix. An absolute
/// batch path replaces the prefix, and empty or `.` components are dropped.
pub fn join_prefix(prefix: Option<&str>, path: &str) -> String {
    let Some(prefix) = prefix else {
        return path.to_owned();
    };

    let joined = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("{prefix}/{path}")
    };
    let parts: Vec<&str> = joined
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    if joined.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}
