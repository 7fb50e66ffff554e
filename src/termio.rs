//! Rendering of service responses as text, tables, JSON or unix-friendly lines

use anyhow::Context as _;
use serde_json::Value;
use std::fmt::Write as _;
use tabled::settings::Style;

/// The output format selected with `--format`
#[derive(clap::ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    Json,
    Unix,
}

/// How a response is shown when the output format is text
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextMode {
    Table,
    Record,
    Raw,
    Silent,
}

type Formatter = Box<dyn Fn(&Value) -> String + Send + Sync>;

enum Getter {
    Key(String),
    Formatted(Formatter),
}

/// A named column (in tables) or line (in records) of text output
pub struct Field {
    name: String,
    getter: Getter,
}

impl Field {
    /// A field showing the value at a dotted `key` path
    pub fn new(name: &str, key: &str) -> Self {
        Self {
            name: name.to_owned(),
            getter: Getter::Key(key.to_owned()),
        }
    }

    /// A field computed from the whole item
    pub fn with(name: &str, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_owned(),
            getter: Getter::Formatted(Box::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, item: &Value) -> String {
        match &self.getter {
            Getter::Key(key) => render_value(lookup(item, key).unwrap_or(&Value::Null)),
            Getter::Formatted(f) => f(item),
        }
    }
}

/// Describes how to show one response
pub struct Display {
    pub text_mode: TextMode,
    pub fields: Vec<Field>,
    pub response_key: Option<String>,
    pub simple_text: Option<String>,
    pub text_preamble: Option<String>,
    pub text_epilog: Option<String>,
}

impl Display {
    fn with_mode(text_mode: TextMode, fields: Vec<Field>) -> Self {
        Self {
            text_mode,
            fields,
            response_key: None,
            simple_text: None,
            text_preamble: None,
            text_epilog: None,
        }
    }

    pub fn table(fields: Vec<Field>) -> Self {
        Self::with_mode(TextMode::Table, fields)
    }

    pub fn record(fields: Vec<Field>) -> Self {
        Self::with_mode(TextMode::Record, fields)
    }

    /// Prints the string at `key` as is
    pub fn raw(key: &str) -> Self {
        Self::with_mode(TextMode::Raw, Vec::new()).response_key(key)
    }

    pub fn silent() -> Self {
        Self::with_mode(TextMode::Silent, Vec::new())
    }

    /// Prints fixed text instead of the response in text mode
    pub fn simple(text: impl Into<String>) -> Self {
        let mut d = Self::with_mode(TextMode::Raw, Vec::new());
        d.simple_text = Some(text.into());
        d
    }

    pub fn response_key(mut self, key: &str) -> Self {
        self.response_key = Some(key.to_owned());
        self
    }

    pub fn preamble(mut self, text: impl Into<String>) -> Self {
        self.text_preamble = Some(text.into());
        self
    }

    pub fn epilog(mut self, text: impl Into<String>) -> Self {
        self.text_epilog = Some(text.into());
        self
    }
}

/// Looks up a dotted path such as `inactive_reason.cause` or `DATA.0.id`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, part| match v {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Renders a single value for text output
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_owned(),
        Value::Bool(true) => "True".to_owned(),
        Value::Bool(false) => "False".to_owned(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn unix_lines(prefix: &str, value: &Value, out: &mut String) {
    let join = |k: &str| {
        if prefix.is_empty() {
            k.to_owned()
        } else {
            format!("{prefix}.{k}")
        }
    };

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                unix_lines(&join(k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                unix_lines(&join(&i.to_string()), v, out);
            }
        }
        scalar => {
            let rendered = match scalar {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if prefix.is_empty() {
                let _ = writeln!(out, "{rendered}");
            } else {
                let _ = writeln!(out, "{prefix}\t{rendered}");
            }
        }
    }
}

fn render_table(items: &[Value], fields: &[Field]) -> String {
    let mut builder = tabled::builder::Builder::default();
    builder.push_record(fields.iter().map(|f| f.name().to_owned()));

    for item in items {
        builder.push_record(fields.iter().map(|f| f.get(item)));
    }

    builder.build().with(Style::psql()).to_string()
}

fn render_record(item: &Value, fields: &[Field]) -> String {
    let width = fields.iter().map(|f| f.name().len()).max().unwrap_or(0) + 1;

    let mut out = String::new();
    for field in fields {
        let label = format!("{}:", field.name());
        let _ = writeln!(out, "{label:width$} {}", field.get(item));
    }
    out
}

/// Renders responses in the selected output format
#[derive(Copy, Clone, Debug, Default)]
pub struct Printer {
    format: Format,
}

impl Printer {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_text(&self) -> bool {
        self.format == Format::Text
    }

    pub fn display(&self, value: &Value, display: &Display) -> anyhow::Result<()> {
        let rendered = self.render(value, display)?;
        print!("{rendered}");
        Ok(())
    }

    pub fn render(&self, value: &Value, display: &Display) -> anyhow::Result<String> {
        match self.format {
            Format::Json => {
                let mut s =
                    serde_json::to_string_pretty(value).context("failed to serialize output")?;
                s.push('\n');
                Ok(s)
            }
            Format::Unix => {
                let subject = match &display.response_key {
                    Some(key) => lookup(value, key).unwrap_or(&Value::Null),
                    None => value,
                };
                let mut out = String::new();
                unix_lines("", subject, &mut out);
                Ok(out)
            }
            Format::Text => Ok(self.render_text(value, display)),
        }
    }

    fn render_text(&self, value: &Value, display: &Display) -> String {
        if display.text_mode == TextMode::Silent {
            return String::new();
        }

        let mut out = String::new();
        if let Some(preamble) = &display.text_preamble {
            let _ = writeln!(out, "{preamble}");
        }

        let subject = match &display.response_key {
            Some(key) => lookup(value, key).unwrap_or(&Value::Null),
            None => value,
        };

        if let Some(simple) = &display.simple_text {
            let _ = writeln!(out, "{simple}");
        } else {
            match display.text_mode {
                TextMode::Table => {
                    let items: &[Value] = match subject {
                        Value::Array(items) => items.as_slice(),
                        Value::Null => &[],
                        single => std::slice::from_ref(single),
                    };
                    let _ = writeln!(out, "{}", render_table(items, &display.fields));
                }
                TextMode::Record => out.push_str(&render_record(subject, &display.fields)),
                TextMode::Raw => {
                    let _ = writeln!(out, "{}", render_value(subject));
                }
                TextMode::Silent => {}
            }
        }

        if let Some(epilog) = &display.text_epilog {
            let _ = writeln!(out, "{epilog}");
        }

        out
    }
}
