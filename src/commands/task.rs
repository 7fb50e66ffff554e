use crate::{
    error::ExitStatus,
    login::scopes,
    parsing::SynchronousTaskWaitOptions,
    services::transfer::{task_wait_with_io, TaskOutcome},
    termio::{Display, Field},
    Context, RequiresLogin,
};
use serde_json::Value;

/// Manage asynchronous tasks
#[derive(clap::Subcommand)]
pub enum Args {
    Show(Show),
    Wait(Wait),
    /// Get a submission ID, for safely resubmitting transfer and delete tasks
    GenerateSubmissionId,
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        &[scopes::TRANSFER_RS]
    }
}

/// Show information about a task
#[derive(clap::Parser)]
pub struct Show {
    task_id: uuid::Uuid,
}

/// Wait for a task to complete.
///
/// Exits 0 if the task succeeded, 1 if it failed, and the value of
/// --timeout-exit-code if it did not complete within --timeout.
#[derive(clap::Parser)]
pub struct Wait {
    task_id: uuid::Uuid,
    #[clap(flatten)]
    wait: SynchronousTaskWaitOptions,
}

fn task_fields() -> Vec<Field> {
    vec![
        Field::new("Label", "label"),
        Field::new("Task ID", "task_id"),
        Field::new("Is Paused", "is_paused"),
        Field::new("Type", "type"),
        Field::new("Directories", "directories"),
        Field::new("Files", "files"),
        Field::new("Status", "status"),
        Field::new("Request Time", "request_time"),
        Field::new("Faults", "faults"),
        Field::new("Total Subtasks", "subtasks_total"),
        Field::new("Subtasks Succeeded", "subtasks_succeeded"),
        Field::new("Subtasks Pending", "subtasks_pending"),
        Field::new("Subtasks Retrying", "subtasks_retrying"),
        Field::new("Subtasks Failed", "subtasks_failed"),
        Field::new("Subtasks Canceled", "subtasks_canceled"),
        Field::new("Subtasks Expired", "subtasks_expired"),
        Field::new("Completion Time", "completion_time"),
        Field::new("Source Endpoint", "source_endpoint_display_name"),
        Field::new("Source Endpoint ID", "source_endpoint_id"),
        Field::new("Destination Endpoint", "destination_endpoint_display_name"),
        Field::new("Destination Endpoint ID", "destination_endpoint_id"),
        Field::new("Bytes Transferred", "bytes_transferred"),
        Field::new("Bytes Per Second", "effective_bytes_per_second"),
    ]
}

/// Prints the final task document (JSON and UNIX only) and turns the outcome
/// of a wait into the process exit status. Text output is empty unless the
/// task succeeded and `success_text` is given.
pub fn finish_wait(
    ctx: &Context,
    outcome: TaskOutcome,
    task: &Value,
    timeout_exit_code: i32,
    success_text: Option<&str>,
) -> anyhow::Result<()> {
    let display = match success_text {
        Some(text) if outcome == TaskOutcome::Succeeded => Display::simple(text),
        _ => Display::silent(),
    };
    ctx.printer.display(task, &display)?;

    let code = match outcome {
        TaskOutcome::Succeeded => 0,
        TaskOutcome::Failed => 1,
        TaskOutcome::TimedOut => timeout_exit_code,
    };

    if code == 0 {
        Ok(())
    } else {
        Err(ExitStatus(code).into())
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let transfer = ctx.login_manager.get_transfer_client().await?;

    match args {
        Args::Show(show) => {
            let task = transfer.get(&format!("task/{}", show.task_id), &[]).await?;
            ctx.printer.display(&task, &Display::record(task_fields()))
        }
        Args::Wait(wait) => {
            let task_id = wait.task_id.to_string();
            let (outcome, task) = task_wait_with_io(&transfer, &task_id, &wait.wait).await?;
            finish_wait(ctx, outcome, &task, wait.wait.timeout_exit_code, None)
        }
        Args::GenerateSubmissionId => {
            let res = transfer.get("submission_id", &[]).await?;
            ctx.printer.display(&res, &Display::raw("value"))
        }
    }
}
