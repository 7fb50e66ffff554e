/// An identity given on the command line, either by id or by username
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedIdentity {
    Id(uuid::Uuid),
    Username(String),
}

impl ParsedIdentity {
    pub fn as_str(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Username(name) => name.clone(),
        }
    }
}

pub fn parse_identity(value: &str) -> Result<ParsedIdentity, String> {
    if value.is_empty() {
        return Err("identity must not be empty".to_owned());
    }

    Ok(match uuid::Uuid::parse_str(value) {
        Ok(id) => ParsedIdentity::Id(id),
        Err(_) => ParsedIdentity::Username(value.to_owned()),
    })
}
