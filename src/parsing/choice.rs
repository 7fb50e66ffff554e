/// A case-insensitive choice which accepts either hyphens or underscores,
/// e.g. both `mapped-collections` and `mapped_collections`.
///
/// The parsed value always uses underscores.
pub fn slugified_choice(
    choices: &'static [&'static str],
) -> impl Fn(&str) -> Result<String, String> + Clone + Send + Sync + 'static {
    move |value: &str| {
        let normalized = value.to_lowercase().replace('_', "-");
        choices
            .iter()
            .find(|c| **c == normalized)
            .map(|c| c.replace('-', "_"))
            .ok_or_else(|| {
                format!(
                    "'{value}' is not one of {}",
                    choices
                        .iter()
                        .map(|c| format!("'{c}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// The items of a comma separated option value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommaList(pub Vec<String>);

impl CommaList {
    pub fn join(&self) -> String {
        self.0.join(",")
    }
}

/// A comma separated list, optionally restricted to a set of choices
pub fn comma_delimited(
    choices: Option<&'static [&'static str]>,
) -> impl Fn(&str) -> Result<CommaList, String> + Clone + Send + Sync + 'static {
    move |value: &str| {
        let items: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(choices) = choices {
            let bad: Vec<&str> = items
                .iter()
                .filter(|i| !choices.contains(&i.as_str()))
                .map(String::as_str)
                .collect();
            if !bad.is_empty() {
                return Err(format!(
                    "the values {bad:?} were not valid choices (valid choices are {choices:?})"
                ));
            }
        }

        Ok(CommaList(items))
    }
}
