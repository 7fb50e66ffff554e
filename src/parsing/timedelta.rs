use std::{sync::OnceLock, time::Duration};

fn timedelta_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(
            r"(?x)
            ^
            \s*
            ((?P<weeks>\d+)w)?
            \s*
            ((?P<days>\d+)d)?
            \s*
            ((?P<hours>\d+)h)?
            \s*
            ((?P<minutes>\d+)m)?
            \s*
            ((?P<seconds>\d+)s)?
            \s*
            $
            ",
        )
        .expect("timedelta regex is valid")
    })
}

/// Parses strings like `1w2d`, `3h 30m` or `90s` into a duration.
///
/// Units must appear in descending order and each at most once.
pub fn parse_timedelta(value: &str) -> Result<Duration, String> {
    let fail = || format!("couldn't parse timedelta: '{value}'");

    let caps = timedelta_regex().captures(value).ok_or_else(fail)?;

    let mut secs: u64 = 0;
    for (unit, mult) in [
        ("weeks", 7 * 24 * 60 * 60),
        ("days", 24 * 60 * 60),
        ("hours", 60 * 60),
        ("minutes", 60),
        ("seconds", 1),
    ] {
        if let Some(m) = caps.name(unit) {
            let n: u64 = m.as_str().parse().map_err(|_| fail())?;
            secs = n
                .checked_mul(mult)
                .and_then(|v| secs.checked_add(v))
                .ok_or_else(fail)?;
        }
    }

    Ok(Duration::from_secs(secs))
}

/// Like [`parse_timedelta`], but yields whole seconds
pub fn parse_timedelta_seconds(value: &str) -> Result<u64, String> {
    parse_timedelta(value).map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse_timedelta_seconds("1w").unwrap(), 604800);
        assert_eq!(parse_timedelta_seconds("1d2h").unwrap(), 93600);
        assert_eq!(parse_timedelta_seconds(" 3h 30m ").unwrap(), 12600);
        assert_eq!(parse_timedelta_seconds("90s").unwrap(), 90);
        assert_eq!(parse_timedelta_seconds("1w1d1h1m1s").unwrap(), 694861);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(parse_timedelta("").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse_timedelta("5x").unwrap_err(),
            "couldn't parse timedelta: '5x'"
        );
        // units out of order
        assert!(parse_timedelta("1m1h").is_err());
        // bare numbers have no unit
        assert!(parse_timedelta("60").is_err());
    }
}
