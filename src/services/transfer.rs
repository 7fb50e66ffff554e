use crate::{
    client::ServiceClient,
    parsing::{
        batch::{parse_batch_line, split_batch_lines},
        endpoint_path::join_prefix,
        notify::NotifyFlags,
        SynchronousTaskWaitOptions,
    },
};
use anyhow::Context as _;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::{io::BufRead, io::Write as _, time::Duration};

/// How Transfer decides whether a file needs to be copied
#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncLevel {
    /// Transfer if the destination file is absent
    Exists,
    /// Transfer if the sizes differ
    Size,
    /// Transfer if the source was modified more recently
    Mtime,
    /// Transfer if the contents differ according to their checksums
    Checksum,
}

impl Serialize for SyncLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Self::Exists => 0,
            Self::Size => 1,
            Self::Mtime => 2,
            Self::Checksum => 3,
        })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub source_path: String,
    pub destination_path: String,
    pub recursive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_algorithm: Option<String>,
}

impl TransferItem {
    pub fn new(source_path: String, destination_path: String, recursive: bool) -> Self {
        Self {
            data_type: "transfer_item",
            source_path,
            destination_path,
            recursive,
            external_checksum: None,
            checksum_algorithm: None,
        }
    }

    pub fn checksum(mut self, external: Option<String>, algorithm: Option<String>) -> Self {
        self.external_checksum = external;
        self.checksum_algorithm = algorithm;
        self
    }
}

/// An exclusion applied to recursive transfers
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FilterRule {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    method: &'static str,
    name: String,
}

impl FilterRule {
    pub fn exclude(name: &str) -> Self {
        Self {
            data_type: "filter_rule",
            method: "exclude",
            name: name.to_owned(),
        }
    }
}

/// Performance tuning knobs, only sent when explicitly given
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PerfOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_cc: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_p: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_pp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_udt: Option<bool>,
}

/// The document submitted to `POST /transfer`
#[derive(Serialize, Clone, Debug)]
pub struct TransferData {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub source_endpoint: String,
    pub destination_endpoint: String,
    #[serde(rename = "DATA")]
    pub items: Vec<TransferItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_level: Option<SyncLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    pub verify_checksum: bool,
    pub preserve_timestamp: bool,
    pub encrypt_data: bool,
    pub skip_source_errors: bool,
    pub fail_on_quota_errors: bool,
    pub delete_destination_extra: bool,
    pub skip_activation_check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_rules: Option<Vec<FilterRule>>,
    #[serde(flatten)]
    pub notify: NotifyFlags,
    #[serde(flatten)]
    pub perf: PerfOptions,
}

impl TransferData {
    pub fn new(source_endpoint: &uuid::Uuid, destination_endpoint: &uuid::Uuid) -> Self {
        Self {
            data_type: "transfer",
            source_endpoint: source_endpoint.to_string(),
            destination_endpoint: destination_endpoint.to_string(),
            items: Vec::new(),
            submission_id: None,
            label: None,
            sync_level: None,
            deadline: None,
            verify_checksum: true,
            preserve_timestamp: false,
            encrypt_data: false,
            skip_source_errors: false,
            fail_on_quota_errors: false,
            delete_destination_extra: false,
            skip_activation_check: false,
            filter_rules: None,
            notify: NotifyFlags::default(),
            perf: PerfOptions::default(),
        }
    }

    pub fn add_item(&mut self, item: TransferItem) {
        self.items.push(item);
    }

    pub fn has_recursive_items(&self) -> bool {
        self.items.iter().any(|i| i.recursive)
    }

    pub fn to_value(&self) -> anyhow::Result<Value> {
        serde_json::to_value(self).context("failed to serialize transfer document")
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DeleteItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub path: String,
}

/// The document submitted to `POST /delete`
#[derive(Serialize, Clone, Debug)]
pub struct DeleteData {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub endpoint: String,
    #[serde(rename = "DATA")]
    pub items: Vec<DeleteItem>,
    pub recursive: bool,
    pub ignore_missing: bool,
    pub interpret_globs: bool,
    pub skip_activation_check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_user: Option<String>,
    #[serde(flatten)]
    pub notify: NotifyFlags,
}

impl DeleteData {
    pub fn new(endpoint: &uuid::Uuid) -> Self {
        Self {
            data_type: "delete",
            endpoint: endpoint.to_string(),
            items: Vec::new(),
            recursive: false,
            ignore_missing: false,
            interpret_globs: false,
            skip_activation_check: false,
            submission_id: None,
            label: None,
            deadline: None,
            local_user: None,
            notify: NotifyFlags::default(),
        }
    }

    pub fn add_item(&mut self, path: String) {
        self.items.push(DeleteItem {
            data_type: "delete_item",
            path,
        });
    }

    pub fn to_value(&self) -> anyhow::Result<Value> {
        serde_json::to_value(self).context("failed to serialize delete document")
    }
}

/// A single line of `globus transfer --batch` input
#[derive(clap::Parser, Debug)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct TransferBatchLine {
    #[arg(long)]
    external_checksum: Option<String>,
    #[arg(short, long, conflicts_with = "external_checksum")]
    recursive: bool,
    source_path: String,
    dest_path: String,
}

/// Adds every line of batch input to the transfer, treating the command line
/// paths as prefixes
pub fn add_batch_to_transfer_data(
    source_base: Option<&str>,
    dest_base: Option<&str>,
    checksum_algorithm: Option<&str>,
    transfer_data: &mut TransferData,
    reader: impl BufRead,
) -> anyhow::Result<()> {
    for (lineno, words) in split_batch_lines(reader)? {
        let line: TransferBatchLine = parse_batch_line(lineno, &words)?;
        transfer_data.add_item(
            TransferItem::new(
                join_prefix(source_base, &line.source_path),
                join_prefix(dest_base, &line.dest_path),
                line.recursive,
            )
            .checksum(
                line.external_checksum,
                checksum_algorithm.map(String::from),
            ),
        );
    }
    Ok(())
}

/// A single line of `globus delete --batch` input
#[derive(clap::Parser, Debug)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct DeleteBatchLine {
    path: String,
}

pub fn add_batch_to_delete_data(
    base: Option<&str>,
    delete_data: &mut DeleteData,
    reader: impl BufRead,
) -> anyhow::Result<()> {
    for (lineno, words) in split_batch_lines(reader)? {
        let line: DeleteBatchLine = parse_batch_line(lineno, &words)?;
        delete_data.add_item(join_prefix(base, &line.path));
    }
    Ok(())
}

/// Serializes `fields` as a document of the given `DATA_TYPE`.
///
/// Fields which should be omitted must be skipped by their `Serialize` impl,
/// any `null` that remains is sent as an explicit null.
pub fn assemble_generic_doc(datatype: &str, fields: impl Serialize) -> anyhow::Result<Value> {
    let mut doc = serde_json::to_value(fields).context("failed to serialize document")?;
    let map = doc
        .as_object_mut()
        .context("document fields must serialize to an object")?;
    map.insert("DATA_TYPE".to_owned(), Value::String(datatype.to_owned()));
    Ok(doc)
}

pub async fn get_submission_id(client: &ServiceClient) -> anyhow::Result<String> {
    let res = client.get("submission_id", &[]).await?;
    res.get("value")
        .and_then(|v| v.as_str())
        .map(String::from)
        .context("submission_id response did not contain a value")
}

fn activation_help_text(res: &Value, endpoint_id: &uuid::Uuid) -> String {
    let mut methods: Vec<&str> = Vec::new();
    for req in res
        .get("DATA")
        .and_then(|d| d.as_array())
        .into_iter()
        .flatten()
    {
        if let Some(ty) = req.get("type").and_then(|t| t.as_str()) {
            if !methods.contains(&ty) {
                methods.push(ty);
            }
        }
    }

    let mut text = format!(
        "This endpoint supports the following activation methods: {}\n",
        methods.join(", ").replace('_', " ")
    );
    for method in &methods {
        let hint = match *method {
            "web" | "oauth" => format!(
                "For web activation use:\n'globus endpoint activate --web {endpoint_id}'\n"
            ),
            "myproxy" => format!(
                "For myproxy activation use:\n'globus endpoint activate --myproxy {endpoint_id}'\n"
            ),
            "delegate_myproxy" => format!(
                "For delegate proxy activation use:\n\
                 'globus endpoint activate --delegate-proxy X.509_PEM_FILE {endpoint_id}'\n"
            ),
            _ => continue,
        };
        text.push_str(&hint);
    }
    text
}

/// Attempts to auto-activate an endpoint whose credentials expire within
/// `if_expires_in` seconds
pub async fn autoactivate(
    client: &ServiceClient,
    endpoint_id: &uuid::Uuid,
    if_expires_in: u64,
) -> anyhow::Result<Value> {
    let res = client
        .request(
            reqwest::Method::POST,
            &format!("endpoint/{endpoint_id}/autoactivate"),
            &[("if_expires_in", if_expires_in.to_string())],
            Some(&json!({})),
        )
        .await?;

    if res.get("code").and_then(|c| c.as_str()) == Some("AutoActivationFailed") {
        anyhow::bail!(
            "The endpoint {endpoint_id} could not be auto-activated.\n\n{}",
            activation_help_text(&res, endpoint_id)
        );
    }

    tracing::debug!(%endpoint_id, code = ?res.get("code"), "autoactivated endpoint");
    Ok(res)
}

pub async fn submit_transfer(client: &ServiceClient, data: &mut TransferData) -> anyhow::Result<Value> {
    if data.submission_id.is_none() {
        data.submission_id = Some(get_submission_id(client).await?);
    }
    let res = client.post("transfer", &data.to_value()?).await?;
    tracing::info!(task_id = ?res.get("task_id"), "submitted transfer task");
    Ok(res)
}

pub async fn submit_delete(client: &ServiceClient, data: &mut DeleteData) -> anyhow::Result<Value> {
    if data.submission_id.is_none() {
        data.submission_id = Some(get_submission_id(client).await?);
    }
    let res = client.post("delete", &data.to_value()?).await?;
    tracing::info!(task_id = ?res.get("task_id"), "submitted delete task");
    Ok(res)
}

/// How waiting on a task ended
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

const SLEEPY_CAT: &str = r"
   |\      _,,,---,,_
   /,`.-'`'    -.  ;-;;,_
  |,4-  ) )-,_..;\ (  `'-'
 '---''(_/--'  `-'\_)
";

const AWAKE_CAT: &str = r"
  /\_/\
 ( o.o )
  > ^ <
";

/// Polls a task until it completes or `timeout` elapses.
///
/// Heartbeats and cats go to stderr so stdout stays parseable.
pub async fn task_wait_with_io(
    client: &ServiceClient,
    task_id: &str,
    opts: &SynchronousTaskWaitOptions,
) -> anyhow::Result<(TaskOutcome, Value)> {
    let mut stderr = std::io::stderr();
    if opts.meow {
        let _ = write!(stderr, "{SLEEPY_CAT}");
    }

    let mut waited = 0;
    loop {
        let task = client.get(&format!("task/{task_id}"), &[]).await?;
        let status = task.get("status").and_then(|s| s.as_str()).unwrap_or_default();
        tracing::debug!(task_id, status, waited, "polled task");

        let outcome = match status {
            "SUCCEEDED" => Some(TaskOutcome::Succeeded),
            "FAILED" => Some(TaskOutcome::Failed),
            _ => None,
        };

        if let Some(outcome) = outcome {
            if opts.heartbeat {
                let _ = writeln!(stderr);
            }
            if opts.meow {
                let _ = write!(stderr, "{AWAKE_CAT}");
            }
            return Ok((outcome, task));
        }

        if let Some(timeout) = opts.timeout {
            if waited >= timeout {
                if opts.heartbeat {
                    let _ = writeln!(stderr);
                }
                let _ = writeln!(stderr, "Task has yet to complete after {timeout} seconds");
                return Ok((TaskOutcome::TimedOut, task));
            }
        }

        tokio::time::sleep(Duration::from_secs(opts.polling_interval)).await;
        waited += opts.polling_interval;

        if opts.heartbeat {
            let _ = write!(stderr, ".");
            let _ = stderr.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: uuid::Uuid = uuid::uuid!("ddb59aef-6d04-11e5-ba46-22000b92c6ec");
    const DST: uuid::Uuid = uuid::uuid!("ddb59af0-6d04-11e5-ba46-22000b92c6ec");

    #[test]
    fn transfer_document_shape() {
        let mut td = TransferData::new(&SRC, &DST);
        td.sync_level = Some(SyncLevel::Mtime);
        td.filter_rules = Some(vec![FilterRule::exclude("*.tmp")]);
        td.notify = NotifyFlags::from_option(Some(&crate::parsing::notify::Notify::Off));
        td.perf.perf_cc = Some(4);
        td.add_item(TransferItem::new("/a".into(), "/b".into(), true));
        td.add_item(
            TransferItem::new("/c".into(), "/d".into(), false)
                .checksum(Some("abc".into()), Some("MD5".into())),
        );

        let v = td.to_value().unwrap();
        assert_eq!(v["DATA_TYPE"], "transfer");
        assert_eq!(v["sync_level"], 2);
        assert_eq!(v["perf_cc"], 4);
        assert!(v.get("perf_p").is_none());
        assert!(v.get("submission_id").is_none());
        assert_eq!(v["notify_on_succeeded"], false);
        assert_eq!(
            v["filter_rules"][0],
            json!({"DATA_TYPE": "filter_rule", "method": "exclude", "name": "*.tmp"})
        );
        assert_eq!(
            v["DATA"][0],
            json!({
                "DATA_TYPE": "transfer_item",
                "source_path": "/a",
                "destination_path": "/b",
                "recursive": true
            })
        );
        assert_eq!(v["DATA"][1]["external_checksum"], "abc");
        assert_eq!(v["DATA"][1]["checksum_algorithm"], "MD5");
    }

    #[test]
    fn batch_lines_with_prefixes() {
        let input = "\
# files
file1.txt myfile1.txt
godata mygodatadir -r
--recursive 'go data' \"my dir\"
--external-checksum abc f2 mf2
/elsewhere/f3 ./sub//mf3
";
        let mut td = TransferData::new(&SRC, &DST);
        add_batch_to_transfer_data(
            Some("/share/"),
            Some("~"),
            Some("SHA1"),
            &mut td,
            input.as_bytes(),
        )
        .unwrap();

        let paths: Vec<(&str, &str, bool)> = td
            .items
            .iter()
            .map(|i| (i.source_path.as_str(), i.destination_path.as_str(), i.recursive))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("/share/file1.txt", "~/myfile1.txt", false),
                ("/share/godata", "~/mygodatadir", true),
                ("/share/go data", "~/my dir", true),
                ("/share/f2", "~/mf2", false),
                ("/elsewhere/f3", "~/sub/mf3", false),
            ]
        );
        assert_eq!(td.items[3].external_checksum.as_deref(), Some("abc"));
        assert_eq!(td.items[3].checksum_algorithm.as_deref(), Some("SHA1"));
        assert!(td.has_recursive_items());
    }

    #[test]
    fn malformed_batch_lines() {
        let mut td = TransferData::new(&SRC, &DST);
        let err =
            add_batch_to_transfer_data(None, None, None, &mut td, "/a /b\n/only-one\n".as_bytes())
                .unwrap_err();
        assert!(err.downcast_ref::<crate::error::UsageError>().is_some());
        assert!(err.to_string().starts_with("error on line 2 of --batch input"));

        let err = add_batch_to_transfer_data(
            None,
            None,
            None,
            &mut td,
            "-r --external-checksum x /a /b\n".as_bytes(),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("error on line 1 of --batch input"));
    }

    #[test]
    fn delete_document_shape() {
        let mut dd = DeleteData::new(&SRC);
        dd.recursive = true;
        add_batch_to_delete_data(Some("/~/"), &mut dd, "a\n# skip\n'b c'\n".as_bytes()).unwrap();

        let v = dd.to_value().unwrap();
        assert_eq!(v["DATA_TYPE"], "delete");
        assert_eq!(v["endpoint"], SRC.to_string());
        assert_eq!(v["recursive"], true);
        assert_eq!(
            v["DATA"],
            json!([
                {"DATA_TYPE": "delete_item", "path": "/~/a"},
                {"DATA_TYPE": "delete_item", "path": "/~/b c"},
            ])
        );
        assert!(v.get("local_user").is_none());
    }

    #[test]
    fn generic_docs_keep_explicit_nulls() {
        #[derive(Serialize)]
        struct Fields {
            permissions: &'static str,
            expiration_date: Option<crate::parsing::Nullable<String>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            other: Option<String>,
        }

        let doc = assemble_generic_doc(
            "access",
            Fields {
                permissions: "rw",
                expiration_date: Some(crate::parsing::Nullable::Null),
                other: None,
            },
        )
        .unwrap();
        assert_eq!(
            doc,
            json!({"DATA_TYPE": "access", "permissions": "rw", "expiration_date": null})
        );
    }

    #[test]
    fn activation_hints() {
        let res = json!({
            "code": "AutoActivationFailed",
            "DATA": [{"type": "myproxy"}, {"type": "myproxy"}, {"type": "delegate_myproxy"}]
        });
        let text = activation_help_text(&res, &SRC);
        assert!(text.starts_with(
            "This endpoint supports the following activation methods: myproxy, delegate myproxy\n"
        ));
        assert!(text.contains(&format!("--myproxy {SRC}")));
        assert!(text.contains("--delegate-proxy"));
    }
}
