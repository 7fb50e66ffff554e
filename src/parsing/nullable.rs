use serde::{Serialize, Serializer};

/// An option value where the empty string means "explicitly unset this field"
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nullable<T> {
    Null,
    Value(T),
}

impl<T> Nullable<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Null => None,
            Self::Value(v) => Some(v),
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Value(v) => v.serialize(serializer),
        }
    }
}

/// `""` becomes [`Nullable::Null`], anything else is kept as is
pub fn parse_string_or_null(value: &str) -> Result<Nullable<String>, String> {
    if value.is_empty() {
        Ok(Nullable::Null)
    } else {
        Ok(Nullable::Value(value.to_owned()))
    }
}

/// Like [`parse_string_or_null`], but non-empty values must be http(s) URLs
pub fn parse_url_or_null(value: &str) -> Result<Nullable<String>, String> {
    if value.is_empty() {
        return Ok(Nullable::Null);
    }

    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(Nullable::Value(value.to_owned()))
        }
        _ => Err(format!("'{value}' is not a well-formed http or https URL")),
    }
}
