use std::collections::BTreeSet;

const EVENTS: &[&str] = &["succeeded", "failed", "inactive"];

/// The parsed value of `--notify`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notify {
    On,
    Off,
    Events(BTreeSet<String>),
}

/// Parses a comma separated list of task events, or `on`/`off`
pub fn parse_notify(value: &str) -> Result<Notify, String> {
    let value = value.to_lowercase();
    let vals: BTreeSet<String> = value
        .split(',')
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect();

    if let Some(bad) = vals
        .iter()
        .find(|v| !EVENTS.contains(&v.as_str()) && *v != "on" && *v != "off")
    {
        return Err(format!(
            "--notify received an invalid value '{bad}'. Valid values are 'on', 'off', {}",
            EVENTS
                .iter()
                .map(|e| format!("'{e}'"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    if vals.len() > 1 && (vals.contains("on") || vals.contains("off")) {
        return Err("--notify cannot accept 'on' or 'off' alongside other values".to_owned());
    }

    Ok(if vals.contains("on") {
        Notify::On
    } else if vals.contains("off") || vals.is_empty() {
        Notify::Off
    } else {
        Notify::Events(vals)
    })
}

/// Task document notification fields derived from `--notify`.
///
/// Unset fields are left out so the service applies its default of
/// notifying on everything.
#[derive(serde::Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct NotifyFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_succeeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_inactive: Option<bool>,
}

impl NotifyFlags {
    pub fn from_option(notify: Option<&Notify>) -> Self {
        let all = |v: bool| Self {
            notify_on_succeeded: Some(v),
            notify_on_failed: Some(v),
            notify_on_inactive: Some(v),
        };

        match notify {
            None => Self::default(),
            Some(Notify::On) => all(true),
            Some(Notify::Off) => all(false),
            Some(Notify::Events(events)) => Self {
                notify_on_succeeded: Some(events.contains("succeeded")),
                notify_on_failed: Some(events.contains("failed")),
                notify_on_inactive: Some(events.contains("inactive")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_and_off() {
        assert_eq!(parse_notify("ON").unwrap(), Notify::On);
        assert_eq!(parse_notify("off").unwrap(), Notify::Off);
        assert_eq!(parse_notify("").unwrap(), Notify::Off);
    }

    #[test]
    fn event_lists() {
        let notify = parse_notify("Succeeded, failed").unwrap();
        let flags = NotifyFlags::from_option(Some(&notify));
        assert_eq!(flags.notify_on_succeeded, Some(true));
        assert_eq!(flags.notify_on_failed, Some(true));
        assert_eq!(flags.notify_on_inactive, Some(false));
    }

    #[test]
    fn rejects_mixed_and_unknown() {
        assert!(parse_notify("on,failed").is_err());
        assert!(parse_notify("off,succeeded").is_err());
        let err = parse_notify("exploded").unwrap_err();
        assert!(err.contains("'exploded'"));
    }

    #[test]
    fn unset_sends_nothing() {
        let v = serde_json::to_value(NotifyFlags::from_option(None)).unwrap();
        assert_eq!(v, serde_json::json!({}));

        let v = serde_json::to_value(NotifyFlags::from_option(Some(&Notify::Off))).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "notify_on_succeeded": false,
                "notify_on_failed": false,
                "notify_on_inactive": false,
            })
        );
    }
}
