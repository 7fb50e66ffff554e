use std::{collections::BTreeMap, str::FromStr};

/// Exit statuses a user may map HTTP statuses onto
fn valid_exit_code(code: i32) -> bool {
    matches!(code, 0 | 1 | 50..=99)
}

/// The value of `--map-http-status`, e.g. `404=50,403=51`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpStatusMap(BTreeMap<u16, i32>);

impl HttpStatusMap {
    pub fn exit_code(&self, http_status: u16) -> Option<i32> {
        self.0.get(&http_status).copied()
    }
}

impl FromStr for HttpStatusMap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = BTreeMap::new();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (status, exit) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid HTTP status mapping '{pair}', expected CODE=EXIT"))?;

            let status: u16 = status
                .trim()
                .parse()
                .map_err(|_| format!("Invalid HTTP status '{status}' in '{pair}'"))?;
            let exit: i32 = exit
                .trim()
                .parse()
                .map_err(|_| format!("Invalid exit code '{exit}' in '{pair}'"))?;

            if !valid_exit_code(exit) {
                return Err(format!(
                    "Invalid exit code {exit} in '{pair}', must be 0, 1 or 50-99"
                ));
            }

            map.insert(status, exit);
        }

        Ok(Self(map))
    }
}

/// clap parser for `--timeout-exit-code`
pub fn parse_exit_code(value: &str) -> Result<i32, String> {
    let code: i32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a valid integer"))?;
    if valid_exit_code(code) {
        Ok(code)
    } else {
        Err("--timeout-exit-code must have a value in 0,1,50-99".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs() {
        let map: HttpStatusMap = "404=50, 403=51".parse().unwrap();
        assert_eq!(map.exit_code(404), Some(50));
        assert_eq!(map.exit_code(403), Some(51));
        assert_eq!(map.exit_code(500), None);
    }

    #[test]
    fn rejects_bad_exit_codes() {
        assert!("404=2".parse::<HttpStatusMap>().is_err());
        assert!("404".parse::<HttpStatusMap>().is_err());
        assert!("abc=50".parse::<HttpStatusMap>().is_err());
    }

    #[test]
    fn timeout_exit_codes() {
        assert_eq!(parse_exit_code("0").unwrap(), 0);
        assert_eq!(parse_exit_code("99").unwrap(), 99);
        assert!(parse_exit_code("2").is_err());
        assert!(parse_exit_code("100").is_err());
    }
}
