use crate::{
    error::ExitStatus,
    parsing::{
        parse_endpoint_plus_optpath, parse_endpoint_plus_reqpath, BatchOption, DeleteAndRmOptions,
        EndpointPath, SynchronousTaskWaitOptions, TaskSubmissionOptions,
    },
    services::transfer::{
        add_batch_to_delete_data, autoactivate, submit_delete, task_wait_with_io, DeleteData,
    },
    termio::{Display, Field},
    usage_error, Context,
};
use std::io::IsTerminal as _;

/// Submit a delete task (asynchronous).
///
/// With `--batch`, each line of input is a path to delete, blank lines and
/// lines starting with `#` are skipped, and a PATH given on the command line
/// is used as a prefix for every line.
#[derive(clap::Parser)]
pub struct Delete {
    #[arg(value_name = "ENDPOINT_ID[:PATH]", value_parser = parse_endpoint_plus_optpath)]
    target: EndpointPath,
    #[clap(flatten)]
    submission: TaskSubmissionOptions,
    #[clap(flatten)]
    options: DeleteAndRmOptions,
    #[clap(flatten)]
    batch: BatchOption,
}

/// Delete a single path and wait for the delete to complete
#[derive(clap::Parser)]
pub struct Rm {
    #[arg(value_name = "ENDPOINT_ID:PATH", value_parser = parse_endpoint_plus_reqpath)]
    target: EndpointPath,
    #[clap(flatten)]
    submission: TaskSubmissionOptions,
    #[clap(flatten)]
    options: DeleteAndRmOptions,
    #[clap(flatten)]
    wait: SynchronousTaskWaitOptions,
}

fn new_delete_data(
    endpoint_id: &uuid::Uuid,
    submission: &TaskSubmissionOptions,
    options: &DeleteAndRmOptions,
    default_globs: bool,
) -> anyhow::Result<DeleteData> {
    let mut dd = DeleteData::new(endpoint_id);
    dd.recursive = options.recursive;
    dd.ignore_missing = options.ignore_missing;
    dd.interpret_globs = options.enable_globs(default_globs);
    dd.local_user = options.local_user.clone();
    dd.skip_activation_check = submission.skip_activation_check;
    dd.submission_id = submission.submission_id.clone();
    dd.label = submission.label.clone();
    dd.deadline = submission.deadline_string()?;
    dd.notify = submission.notify_flags();
    Ok(dd)
}

/// Asks before deleting a path ending in `*` when globs are enabled, unless
/// `--star-silent` was given or there is nobody to ask
fn confirm_star(path: &str, options: &DeleteAndRmOptions, globs: bool) -> anyhow::Result<()> {
    if options.star_silent || !globs || !path.ends_with('*') {
        return Ok(());
    }
    if !std::io::stderr().is_terminal() || !std::io::stdin().is_terminal() {
        return Ok(());
    }

    if !super::confirm(&format!(
        "Are you sure you want to delete all files matching \"{path}\"?"
    ))? {
        eprintln!("Aborted.");
        return Err(ExitStatus(1).into());
    }
    Ok(())
}

fn dry_run_display() -> Display {
    Display::table(vec![Field::new("Path", "path")]).response_key("DATA")
}

pub async fn run_delete(args: Delete, ctx: &Context) -> anyhow::Result<()> {
    let path = args.target.path.as_deref();
    if path.is_none() && args.batch.batch.is_none() {
        usage_error!("delete requires either a PATH OR --batch");
    }

    let mut dd = new_delete_data(
        &args.target.endpoint_id,
        &args.submission,
        &args.options,
        false,
    )?;

    if let Some(batch) = &args.batch.batch {
        add_batch_to_delete_data(path, &mut dd, batch.open()?)?;
    } else if let Some(path) = path {
        confirm_star(path, &args.options, dd.interpret_globs)?;
        dd.add_item(path.to_owned());
    }

    if args.submission.dry_run {
        return ctx.printer.display(&dd.to_value()?, &dry_run_display());
    }

    let transfer = ctx.login_manager.get_transfer_client().await?;
    if !args.submission.skip_activation_check {
        autoactivate(&transfer, &args.target.endpoint_id, 60).await?;
    }

    let res = submit_delete(&transfer, &mut dd).await?;
    ctx.printer.display(
        &res,
        &Display::record(vec![
            Field::new("Message", "message"),
            Field::new("Task ID", "task_id"),
        ]),
    )
}

pub async fn run_rm(args: Rm, ctx: &Context) -> anyhow::Result<()> {
    let mut dd = new_delete_data(
        &args.target.endpoint_id,
        &args.submission,
        &args.options,
        true,
    )?;

    let path = args.target.path.clone().unwrap_or_default();
    confirm_star(&path, &args.options, dd.interpret_globs)?;
    dd.add_item(path);

    if args.submission.dry_run {
        return ctx.printer.display(&dd.to_value()?, &dry_run_display());
    }

    let transfer = ctx.login_manager.get_transfer_client().await?;
    if !args.submission.skip_activation_check {
        autoactivate(&transfer, &args.target.endpoint_id, 60).await?;
    }

    let res = submit_delete(&transfer, &mut dd).await?;
    let task_id = res
        .get("task_id")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_owned();
    // stdout is reserved for the final task document
    eprintln!("Delete task submitted under ID \"{task_id}\"");

    let (outcome, task) = task_wait_with_io(&transfer, &task_id, &args.wait).await?;
    super::task::finish_wait(
        ctx,
        outcome,
        &task,
        args.wait.timeout_exit_code,
        Some("Delete task succeeded"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const EP: &str = "ddb59aef-6d04-11e5-ba46-22000b92c6ec";

    #[test]
    fn rm_requires_a_path() {
        assert!(Rm::try_parse_from(["rm", EP]).is_err());
        assert!(Rm::try_parse_from(["rm", format!("{EP}:/~/file").as_str()]).is_ok());
    }

    #[test]
    fn rm_enables_globs_by_default() {
        let args = Rm::try_parse_from(["rm", format!("{EP}:/~/dir").as_str(), "-r"]).unwrap();
        let dd = new_delete_data(
            &args.target.endpoint_id,
            &args.submission,
            &args.options,
            true,
        )
        .unwrap();
        assert!(dd.interpret_globs && dd.recursive);

        let args = Delete::try_parse_from(["delete", format!("{EP}:/~/dir").as_str()]).unwrap();
        let dd = new_delete_data(
            &args.target.endpoint_id,
            &args.submission,
            &args.options,
            false,
        )
        .unwrap();
        assert!(!dd.interpret_globs);
    }

    #[test]
    fn delete_options_in_document() {
        let args = Delete::try_parse_from([
            "delete",
            format!("{EP}:/~/dir").as_str(),
            "-f",
            "--local-user",
            "alice",
            "--label",
            "cleanup",
            "--deadline",
            "2030-01-02",
        ])
        .unwrap();
        let v = new_delete_data(
            &args.target.endpoint_id,
            &args.submission,
            &args.options,
            false,
        )
        .unwrap()
        .to_value()
        .unwrap();

        assert_eq!(v["ignore_missing"], true);
        assert_eq!(v["local_user"], "alice");
        assert_eq!(v["label"], "cleanup");
        assert_eq!(v["deadline"], "2030-01-02 00:00:00");
    }

    #[test]
    fn star_silent_skips_confirmation() {
        let args = Rm::try_parse_from(["rm", format!("{EP}:/~/dir/*").as_str(), "--star-silent"]).unwrap();
        assert!(confirm_star("/~/dir/*", &args.options, true).is_ok());
    }
}
