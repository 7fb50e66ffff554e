use super::timer_fields;
use crate::{
    client::ServiceClient,
    parsing::{
        datetime::{format_rfc3339, parse_datetime},
        parse_endpoint_plus_optpath, parse_timedelta_seconds, BatchOption, EndpointPath,
    },
    services::transfer::{
        add_batch_to_transfer_data, FilterRule, SyncLevel, TransferData, TransferItem,
    },
    termio::Display,
    usage_error, Context,
};
use serde_json::{json, Value};
use time::PrimitiveDateTime;

/// Create a timer
#[derive(clap::Subcommand)]
pub enum Args {
    Transfer(Transfer),
}

/// Create a timer which runs a transfer on a schedule.
///
/// Without `--interval` the transfer runs once, at `--start` or immediately.
#[derive(clap::Parser)]
pub struct Transfer {
    #[arg(
        value_name = "SOURCE_ENDPOINT_ID[:SOURCE_PATH]",
        value_parser = parse_endpoint_plus_optpath
    )]
    source: EndpointPath,
    #[arg(
        value_name = "DEST_ENDPOINT_ID[:DEST_PATH]",
        value_parser = parse_endpoint_plus_optpath
    )]
    destination: EndpointPath,
    #[clap(flatten)]
    batch: BatchOption,
    /// Start time for the timer. Defaults to now
    #[arg(long, value_parser = parse_datetime)]
    start: Option<PrimitiveDateTime>,
    /// Interval at which the timer should run, e.g. `1d`, `4h 30m`
    #[arg(long, value_parser = parse_timedelta_seconds)]
    interval: Option<u64>,
    /// A name for the timer
    #[arg(long)]
    name: Option<String>,
    /// Stop running the transfer after this date
    #[arg(long, value_parser = parse_datetime, conflicts_with = "stop_after_runs")]
    stop_after_date: Option<PrimitiveDateTime>,
    /// Stop running the transfer after this number of runs have happened
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    stop_after_runs: Option<u64>,
    /// A label for the transfer tasks submitted by the timer
    #[arg(long)]
    label: Option<String>,
    #[arg(short, long, value_enum)]
    sync_level: Option<SyncLevel>,
    #[arg(short, long)]
    recursive: bool,
    #[arg(long, visible_alias = "preserve-mtime")]
    preserve_timestamp: bool,
    #[arg(long)]
    no_verify_checksum: bool,
    #[arg(long, visible_alias = "encrypt")]
    encrypt_data: bool,
    #[arg(long)]
    skip_source_errors: bool,
    #[arg(long)]
    fail_on_quota_errors: bool,
    #[arg(long)]
    delete: bool,
    #[arg(long)]
    exclude: Vec<String>,
}

impl Transfer {
    fn transfer_data(&self) -> anyhow::Result<TransferData> {
        let source_path = self.source.path.as_deref();
        let dest_path = self.destination.path.as_deref();

        if self.recursive && self.batch.batch.is_some() {
            usage_error!(
                "You cannot use --recursive in addition to --batch. \
                 Instead, use --recursive on lines of --batch input which need it"
            );
        }

        let mut td = TransferData::new(&self.source.endpoint_id, &self.destination.endpoint_id);
        td.label = self.label.clone();
        td.sync_level = self.sync_level;
        td.verify_checksum = !self.no_verify_checksum;
        td.preserve_timestamp = self.preserve_timestamp;
        td.encrypt_data = self.encrypt_data;
        td.skip_source_errors = self.skip_source_errors;
        td.fail_on_quota_errors = self.fail_on_quota_errors;
        td.delete_destination_extra = self.delete;
        if !self.exclude.is_empty() {
            td.filter_rules = Some(self.exclude.iter().map(|e| FilterRule::exclude(e)).collect());
        }

        match (&self.batch.batch, source_path, dest_path) {
            (Some(batch), _, _) => {
                add_batch_to_transfer_data(source_path, dest_path, None, &mut td, batch.open()?)?
            }
            (None, Some(src), Some(dst)) => {
                td.add_item(TransferItem::new(src.to_owned(), dst.to_owned(), self.recursive))
            }
            _ => usage_error!("transfer requires either SOURCE_PATH and DEST_PATH or --batch"),
        }

        if !self.exclude.is_empty() && !td.has_recursive_items() {
            usage_error!("--exclude can only be used with --recursive transfers");
        }

        Ok(td)
    }

    fn schedule(&self, now: &str) -> anyhow::Result<Value> {
        let start = match &self.start {
            Some(start) => format_rfc3339(start)?,
            None => now.to_owned(),
        };

        let Some(interval) = self.interval else {
            if self.stop_after_date.is_some() || self.stop_after_runs.is_some() {
                usage_error!("--stop-after-date and --stop-after-runs require --interval");
            }
            return Ok(json!({"type": "once", "datetime": start}));
        };

        let mut schedule = json!({
            "type": "recurring",
            "interval_seconds": interval,
            "start": start,
        });
        if let Some(date) = &self.stop_after_date {
            schedule["end"] = json!({"condition": "time", "datetime": format_rfc3339(date)?});
        } else if let Some(count) = self.stop_after_runs {
            schedule["end"] = json!({"condition": "iterations", "count": count});
        }
        Ok(schedule)
    }

    fn document(&self, now: &str) -> anyhow::Result<Value> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("CLI Created Timer [{now}]"));

        Ok(json!({
            "timer": {
                "timer_type": "transfer",
                "name": name,
                "schedule": self.schedule(now)?,
                "body": self.transfer_data()?.to_value()?,
                "resource_server": crate::login::scopes::TRANSFER_RS,
            }
        }))
    }
}

pub async fn run(args: Args, timer: &ServiceClient, ctx: &Context) -> anyhow::Result<()> {
    let Args::Transfer(transfer) = args;

    let now = time::OffsetDateTime::now_utc()
        .replace_nanosecond(0)?
        .format(&time::format_description::well_known::Rfc3339)?;
    let doc = transfer.document(&now)?;

    let res = timer.post("v2/timer", &doc).await?;
    ctx.printer
        .display(&res, &Display::record(timer_fields()).response_key("timer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SRC: &str = "ddb59aef-6d04-11e5-ba46-22000b92c6ec";
    const DST: &str = "ddb59af0-6d04-11e5-ba46-22000b92c6ec";
    const NOW: &str = "2024-01-01T00:00:00Z";

    fn parse(extra: &[&str]) -> Transfer {
        let src = format!("{SRC}:/src");
        let dst = format!("{DST}:/dst");
        let mut args = vec!["transfer", src.as_str(), dst.as_str()];
        args.extend_from_slice(extra);
        Transfer::try_parse_from(args).unwrap()
    }

    #[test]
    fn once_by_default() {
        let doc = parse(&[]).document(NOW).unwrap();
        assert_eq!(
            doc["timer"]["schedule"],
            json!({"type": "once", "datetime": NOW})
        );
        assert_eq!(doc["timer"]["name"], "CLI Created Timer [2024-01-01T00:00:00Z]");
        assert_eq!(doc["timer"]["body"]["DATA"][0]["source_path"], "/src");
    }

    #[test]
    fn recurring_with_end() {
        let doc = parse(&[
            "--interval",
            "1d",
            "--start",
            "2024-02-01",
            "--stop-after-runs",
            "3",
            "--name",
            "nightly",
            "-r",
        ])
        .document(NOW)
        .unwrap();
        assert_eq!(
            doc["timer"]["schedule"],
            json!({
                "type": "recurring",
                "interval_seconds": 86400,
                "start": "2024-02-01T00:00:00Z",
                "end": {"condition": "iterations", "count": 3},
            })
        );
        assert_eq!(doc["timer"]["name"], "nightly");
        assert_eq!(doc["timer"]["body"]["DATA"][0]["recursive"], true);
    }

    #[test]
    fn end_needs_interval() {
        assert!(parse(&["--stop-after-runs", "2"]).document(NOW).is_err());
    }

    #[test]
    fn end_conditions_conflict() {
        let src = format!("{SRC}:/src");
        let dst = format!("{DST}:/dst");
        assert!(Transfer::try_parse_from([
            "transfer",
            src.as_str(),
            dst.as_str(),
            "--interval",
            "1h",
            "--stop-after-runs",
            "2",
            "--stop-after-date",
            "2025-01-01",
        ])
        .is_err());
    }
}
