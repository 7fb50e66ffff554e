use crate::{
    parsing::{parse_endpoint_plus_optpath, BatchOption, EndpointPath, TaskSubmissionOptions},
    services::transfer::{
        add_batch_to_transfer_data, autoactivate, submit_transfer, FilterRule, PerfOptions,
        SyncLevel, TransferData, TransferItem,
    },
    termio::{render_value, Display, Field},
    usage_error, Context,
};
use serde_json::Value;

/// Submit a transfer task (asynchronous).
///
/// Copies a file or directory from one endpoint to another. With `--batch`,
/// each line of input is `[--recursive] [--external-checksum TEXT] SOURCE_PATH
/// DEST_PATH`, blank lines and lines starting with `#` are skipped, and any
/// SOURCE_PATH/DEST_PATH given on the command line is used as a prefix for the
/// paths of every line.
#[derive(clap::Parser)]
pub struct Args {
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
    submission: TaskSubmissionOptions,
    #[clap(flatten)]
    batch: BatchOption,
    /// How to decide whether or not files are copied. If a transfer fails,
    /// 'checksum' must be used to restart it, all other levels can lead to
    /// data corruption.
    #[arg(short, long, value_enum)]
    sync_level: Option<SyncLevel>,
    /// SOURCE_PATH and DEST_PATH are directories, transfer them recursively
    #[arg(short, long, overrides_with = "no_recursive", conflicts_with = "external_checksum")]
    recursive: bool,
    /// SOURCE_PATH and DEST_PATH are files
    #[arg(long, overrides_with = "recursive", hide = true)]
    no_recursive: bool,
    /// Preserve file and directory modification times
    #[arg(long, visible_alias = "preserve-mtime")]
    preserve_timestamp: bool,
    /// Verify checksum after transfer (the default)
    #[arg(long, overrides_with = "no_verify_checksum")]
    verify_checksum: bool,
    /// Don't verify checksums after transfer
    #[arg(long, overrides_with = "verify_checksum")]
    no_verify_checksum: bool,
    /// Encrypt data sent through the network
    #[arg(long, visible_alias = "encrypt")]
    encrypt_data: bool,
    /// Skip over source paths that hit permission denied or file not found
    /// errors during the transfer
    #[arg(long)]
    skip_source_errors: bool,
    /// Cause the task to fail if any quota exceeded errors are hit during the
    /// transfer
    #[arg(long)]
    fail_on_quota_errors: bool,
    /// Delete extraneous files in the destination directory. Only applies to
    /// recursive directory transfers.
    #[arg(long)]
    delete: bool,
    /// An external checksum to verify source file and data transfer integrity.
    /// Assumed to be an MD5 checksum if --checksum-algorithm is not given.
    #[arg(long)]
    external_checksum: Option<String>,
    /// Specify an algorithm for --external-checksum or --verify-checksum
    #[arg(long)]
    checksum_algorithm: Option<String>,
    /// Exclude files and directories found with names that match the given
    /// pattern in recursive transfers. Pattern may include * ? or [] for unix
    /// style globbing. Give this option multiple times to exclude multiple
    /// patterns.
    #[arg(long)]
    exclude: Vec<String>,
    #[arg(long, hide = true)]
    perf_cc: Option<i64>,
    #[arg(long, hide = true)]
    perf_p: Option<i64>,
    #[arg(long, hide = true)]
    perf_pp: Option<i64>,
    #[arg(long, hide = true)]
    perf_udt: bool,
}

/// Builds the transfer document, reading batch input if requested
pub fn build_transfer_data(args: &Args) -> anyhow::Result<TransferData> {
    let source_path = args.source.path.as_deref();
    let dest_path = args.destination.path.as_deref();

    if args.recursive && args.batch.batch.is_some() {
        usage_error!(
            "You cannot use --recursive in addition to --batch. \
             Instead, use --recursive on lines of --batch input which need it"
        );
    }
    if args.external_checksum.is_some() && args.batch.batch.is_some() {
        usage_error!(
            "You cannot use --external-checksum in addition to --batch. \
             Instead, use --external-checksum on lines of --batch input which need it"
        );
    }
    if (source_path.is_none() || dest_path.is_none()) && args.batch.batch.is_none() {
        usage_error!("transfer requires either SOURCE_PATH and DEST_PATH or --batch");
    }

    let sub = &args.submission;
    let mut td = TransferData::new(&args.source.endpoint_id, &args.destination.endpoint_id);
    td.label = sub.label.clone();
    td.submission_id = sub.submission_id.clone();
    td.deadline = sub.deadline_string()?;
    td.sync_level = args.sync_level;
    td.verify_checksum = args.verify_checksum || !args.no_verify_checksum;
    td.preserve_timestamp = args.preserve_timestamp;
    td.encrypt_data = args.encrypt_data;
    td.skip_source_errors = args.skip_source_errors;
    td.fail_on_quota_errors = args.fail_on_quota_errors;
    td.delete_destination_extra = args.delete;
    td.skip_activation_check = sub.skip_activation_check;
    td.notify = sub.notify_flags();
    td.perf = PerfOptions {
        perf_cc: args.perf_cc,
        perf_p: args.perf_p,
        perf_pp: args.perf_pp,
        perf_udt: args.perf_udt.then_some(true),
    };
    if !args.exclude.is_empty() {
        td.filter_rules = Some(args.exclude.iter().map(|e| FilterRule::exclude(e)).collect());
    }

    if let Some(batch) = &args.batch.batch {
        add_batch_to_transfer_data(
            source_path,
            dest_path,
            args.checksum_algorithm.as_deref(),
            &mut td,
            batch.open()?,
        )?;
    } else if let (Some(src), Some(dst)) = (source_path, dest_path) {
        let recursive = args.recursive && !args.no_recursive;
        td.add_item(
            TransferItem::new(src.to_owned(), dst.to_owned(), recursive).checksum(
                args.external_checksum.clone(),
                args.checksum_algorithm.clone(),
            ),
        );
    }

    if !args.exclude.is_empty() && !td.has_recursive_items() {
        usage_error!("--exclude can only be used with --recursive transfers");
    }

    Ok(td)
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let mut td = build_transfer_data(&args)?;

    if args.submission.dry_run {
        return ctx.printer.display(
            &td.to_value()?,
            &Display::table(vec![
                Field::new("Source Path", "source_path"),
                Field::new("Dest Path", "destination_path"),
                Field::new("Recursive", "recursive"),
                Field::with("External Checksum", |item| {
                    render_value(item.get("external_checksum").unwrap_or(&Value::Null))
                }),
            ])
            .response_key("DATA"),
        );
    }

    let transfer = ctx.login_manager.get_transfer_client().await?;

    if !args.submission.skip_activation_check {
        autoactivate(&transfer, &args.source.endpoint_id, 60).await?;
        autoactivate(&transfer, &args.destination.endpoint_id, 60).await?;
    }

    let res = submit_transfer(&transfer, &mut td).await?;
    ctx.printer.display(
        &res,
        &Display::record(vec![
            Field::new("Message", "message"),
            Field::new("Task ID", "task_id"),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SRC: &str = "ddb59aef-6d04-11e5-ba46-22000b92c6ec";
    const DST: &str = "ddb59af0-6d04-11e5-ba46-22000b92c6ec";

    fn parse(extra: &[&str]) -> Args {
        Args::try_parse_from(["transfer"].iter().chain(extra.iter())).unwrap()
    }

    fn usage_err(extra: &[&str]) -> String {
        let err = build_transfer_data(&parse(extra)).unwrap_err();
        assert!(err.downcast_ref::<crate::error::UsageError>().is_some());
        err.to_string()
    }

    #[test]
    fn single_item() {
        let src = format!("{SRC}:/share/godata/");
        let dst = format!("{DST}:~/mynewdir/");
        let td = build_transfer_data(&parse(&[
            &src,
            &dst,
            "-r",
            "--sync-level",
            "checksum",
            "--exclude",
            "*.tmp",
            "--notify",
            "failed",
        ]))
        .unwrap();

        let v = td.to_value().unwrap();
        assert_eq!(v["source_endpoint"], SRC);
        assert_eq!(v["sync_level"], 3);
        assert_eq!(v["verify_checksum"], true);
        assert_eq!(v["DATA"][0]["source_path"], "/share/godata/");
        assert_eq!(v["DATA"][0]["recursive"], true);
        assert_eq!(v["filter_rules"][0]["name"], "*.tmp");
        assert_eq!(v["notify_on_failed"], true);
        assert_eq!(v["notify_on_succeeded"], false);
        assert!(v.get("perf_udt").is_none());
    }

    #[test]
    fn requires_paths_or_batch() {
        assert_eq!(
            usage_err(&[SRC, DST]),
            "transfer requires either SOURCE_PATH and DEST_PATH or --batch"
        );
    }

    #[test]
    fn batch_conflicts() {
        let msg = usage_err(&[SRC, DST, "--batch", "-", "--recursive"]);
        assert!(msg.starts_with("You cannot use --recursive in addition to --batch."));

        let msg = usage_err(&[SRC, DST, "--batch", "-", "--external-checksum", "abc"]);
        assert!(msg.starts_with("You cannot use --external-checksum in addition to --batch."));
    }

    #[test]
    fn recursive_and_checksum_are_exclusive() {
        let src = format!("{SRC}:/a");
        let dst = format!("{DST}:/b");
        assert!(Args::try_parse_from([
            "transfer",
            src.as_str(),
            dst.as_str(),
            "-r",
            "--external-checksum",
            "abc"
        ])
        .is_err());
    }

    #[test]
    fn exclude_needs_recursion() {
        let src = format!("{SRC}:/a");
        let dst = format!("{DST}:/b");
        assert_eq!(
            usage_err(&[&src, &dst, "--exclude", "*.log"]),
            "--exclude can only be used with --recursive transfers"
        );
    }

    #[test]
    fn batch_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.txt");
        std::fs::write(&path, "file1.txt myfile1.txt\n--recursive godata mygodatadir\n").unwrap();

        let src = format!("{SRC}:/share/");
        let dst = format!("{DST}:~/");
        let td = build_transfer_data(&parse(&[
            &src,
            &dst,
            "--batch",
            path.to_str().unwrap(),
            "--exclude",
            "*.tmp",
            "--no-verify-checksum",
        ]))
        .unwrap();

        assert_eq!(td.items.len(), 2);
        assert_eq!(td.items[0].source_path, "/share/file1.txt");
        assert_eq!(td.items[1].destination_path, "~/mygodatadir");
        assert!(!td.verify_checksum);
    }
}
