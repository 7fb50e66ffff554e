use time::{macros::format_description, PrimitiveDateTime};

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD HH:MM:SS`
pub fn parse_datetime(value: &str) -> Result<PrimitiveDateTime, String> {
    let value = value.trim();

    if let Ok(dt) = PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(dt);
    }
    if let Ok(dt) = PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(dt);
    }
    if let Ok(date) = time::Date::parse(value, format_description!("[year]-[month]-[day]")) {
        return Ok(date.midnight());
    }

    Err(format!(
        "'{value}' does not match the formats '%Y-%m-%d', '%Y-%m-%dT%H:%M:%S', '%Y-%m-%d %H:%M:%S'"
    ))
}

/// The `YYYY-MM-DD HH:MM:SS` form the Transfer service expects for deadlines
pub fn format_deadline(dt: &PrimitiveDateTime) -> anyhow::Result<String> {
    Ok(dt.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))?)
}

/// RFC 3339, treating the value as UTC
pub fn format_rfc3339(dt: &PrimitiveDateTime) -> anyhow::Result<String> {
    Ok(dt
        .assume_utc()
        .format(&time::format_description::well_known::Rfc3339)?)
}
