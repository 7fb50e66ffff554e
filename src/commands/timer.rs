use crate::{
    error::AuthRequirementsError,
    login::scopes,
    services::auth::{get_consents, AuthRequirements},
    termio::{lookup, render_value, Display, Field},
    Context, RequiresLogin,
};
use serde_json::{json, Value};

mod create;

/// Schedule and manage jobs in Globus Timers
#[derive(clap::Subcommand)]
pub enum Args {
    /// List your timers
    List,
    /// Display a timer
    Show(TimerId),
    /// Delete a timer
    Delete(TimerId),
    /// Pause a timer so that it stops running until resumed
    Pause(TimerId),
    Resume(Resume),
    #[clap(subcommand)]
    Create(create::Args),
}

impl RequiresLogin for Args {
    fn resource_servers(&self) -> &'static [&'static str] {
        match self {
            Self::Resume(_) => &[scopes::AUTH_RS, scopes::TIMER_RS],
            Self::Create(_) => &[scopes::AUTH_RS, scopes::TIMER_RS, scopes::TRANSFER_RS],
            _ => &[scopes::TIMER_RS],
        }
    }
}

#[derive(clap::Parser)]
pub struct TimerId {
    timer_id: uuid::Uuid,
}

/// Resume a timer
#[derive(clap::Parser)]
pub struct Resume {
    timer_id: uuid::Uuid,
    /// Disable the check which requires that the timer's credentials be
    /// valid before it is resumed
    #[arg(long)]
    skip_inactive_reason_check: bool,
}

/// Renders an interval like `1 day, 2:00:00`
fn format_interval(secs: u64) -> String {
    let days = secs / 86400;
    let rem = secs % 86400;
    let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {hms}"),
        d => format!("{d} days, {hms}"),
    }
}

pub(crate) fn timer_fields() -> Vec<Field> {
    vec![
        Field::new("Timer ID", "job_id"),
        Field::new("Name", "name"),
        Field::new("Type", "type"),
        Field::new("Submitted At", "submitted_at"),
        Field::new("Status", "status"),
        Field::new("Last Run", "last_ran_at"),
        Field::new("Next Run", "next_run"),
        Field::with("Interval", |job| {
            let secs = lookup(job, "schedule.interval_seconds")
                .or_else(|| job.get("interval"))
                .and_then(|v| v.as_u64());
            match secs {
                Some(secs) => format_interval(secs),
                None => render_value(&Value::Null),
            }
        }),
    ]
}

/// The auth requirements which made a timer inactive, if that is why it
/// stopped running
fn inactive_reason(job: &Value) -> Option<AuthRequirements> {
    if job.get("status").and_then(|s| s.as_str()) != Some("inactive") {
        return None;
    }
    let reason = job.get("inactive_reason")?;
    if reason.get("cause").and_then(|c| c.as_str()) != Some("globus_auth_requirements") {
        return None;
    }
    AuthRequirements::from_value(reason.get("detail")?)
}

/// Requirements a consent check can't satisfy
fn unhandled_requirements(gare: &AuthRequirements) -> Vec<String> {
    gare.authorization_parameters
        .set_keys()
        .into_iter()
        .filter(|k| k != "required_scopes" && k != "session_message")
        .collect()
}

fn check_requirements(
    timer_id: &uuid::Uuid,
    gare: &AuthRequirements,
    has_consents: bool,
) -> anyhow::Result<()> {
    if !has_consents {
        return Err(AuthRequirementsError {
            message: "This timer is missing a necessary consent in order to resume.".to_owned(),
            requirements: gare.clone(),
            epilog: None,
        }
        .into());
    }

    if unhandled_requirements(gare).is_empty() {
        return Ok(());
    }

    Err(AuthRequirementsError {
        message: "This timer has additional authentication requirements that must be met \
                  in order to resume."
            .to_owned(),
        requirements: gare.clone(),
        epilog: Some(format!(
            "After updating your session, resume the timer with:\n\n    \
             globus timer resume --skip-inactive-reason-check {timer_id}\n"
        )),
    }
    .into())
}

async fn check_inactive_reason(
    ctx: &Context,
    timer_id: &uuid::Uuid,
    gare: &AuthRequirements,
) -> anyhow::Result<()> {
    let has_consents = match gare
        .authorization_parameters
        .required_scopes
        .as_ref()
        .filter(|s| !s.is_empty())
    {
        Some(required) => {
            let auth = ctx.login_manager.get_auth_client().await?;
            let identity_id = ctx.login_manager.get_current_identity_id().await?;
            get_consents(&auth, &identity_id)
                .await?
                .contains_scopes(required)?
        }
        None => true,
    };

    check_requirements(timer_id, gare, has_consents)
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let timer = ctx.login_manager.get_timer_client().await?;

    match args {
        Args::List => {
            let res = timer.get("jobs/", &[]).await?;
            let mut fields = timer_fields();
            fields.pop();
            ctx.printer
                .display(&res, &Display::table(fields).response_key("jobs"))
        }
        Args::Show(TimerId { timer_id }) => {
            let res = timer.get(&format!("jobs/{timer_id}"), &[]).await?;
            ctx.printer.display(&res, &Display::record(timer_fields()))
        }
        Args::Delete(TimerId { timer_id }) => {
            let res = timer.delete(&format!("jobs/{timer_id}")).await?;
            ctx.printer.display(&res, &Display::record(timer_fields()))
        }
        Args::Pause(TimerId { timer_id }) => {
            let res = timer
                .post(&format!("jobs/{timer_id}/pause"), &json!({}))
                .await?;
            ctx.printer.display(&res, &Display::raw("message"))
        }
        Args::Resume(resume) => {
            let job = timer.get(&format!("jobs/{}", resume.timer_id), &[]).await?;
            let gare = inactive_reason(&job);

            if let Some(gare) = gare.as_ref().filter(|_| !resume.skip_inactive_reason_check) {
                check_inactive_reason(ctx, &resume.timer_id, gare).await?;
            }

            let res = timer
                .post(
                    &format!("jobs/{}/resume", resume.timer_id),
                    &json!({ "update_credentials": gare.is_some() }),
                )
                .await?;
            ctx.printer.display(&res, &Display::raw("message"))
        }
        Args::Create(create) => create::run(create, &timer, ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMER: uuid::Uuid = uuid::uuid!("ddb59aef-6d04-11e5-ba46-22000b92c6ec");

    fn inactive_job(detail: Value) -> Value {
        json!({
            "job_id": TIMER.to_string(),
            "status": "inactive",
            "inactive_reason": {
                "cause": "globus_auth_requirements",
                "detail": detail,
            },
        })
    }

    #[test]
    fn active_timers_have_no_reason() {
        assert!(inactive_reason(&json!({"status": "loaded"})).is_none());
        assert!(inactive_reason(&json!({
            "status": "inactive",
            "inactive_reason": {"cause": "user"},
        }))
        .is_none());
    }

    #[test]
    fn missing_consent() {
        let job = inactive_job(json!({
            "code": "ConsentRequired",
            "authorization_parameters": {
                "required_scopes": ["urn:globus:auth:scope:transfer.api.globus.org:all"],
                "session_message": "consent please",
            },
        }));
        let gare = inactive_reason(&job).unwrap();
        assert!(unhandled_requirements(&gare).is_empty());

        let err = check_requirements(&TIMER, &gare, false).unwrap_err();
        let err = err.downcast_ref::<AuthRequirementsError>().unwrap();
        assert_eq!(
            err.message,
            "This timer is missing a necessary consent in order to resume."
        );
        assert!(err.epilog.is_none());

        assert!(check_requirements(&TIMER, &gare, true).is_ok());
    }

    #[test]
    fn unknown_parameters_do_not_block_resume() {
        let job = inactive_job(json!({
            "code": "ConsentRequired",
            "authorization_parameters": {
                "required_scopes": ["urn:globus:auth:scope:transfer.api.globus.org:all"],
                "prompt_hint": "vendor specific",
            },
        }));
        let gare = inactive_reason(&job).unwrap();
        assert!(unhandled_requirements(&gare).is_empty());
        assert!(check_requirements(&TIMER, &gare, true).is_ok());
    }

    #[test]
    fn additional_requirements() {
        let job = inactive_job(json!({
            "code": "AuthorizationRequired",
            "authorization_parameters": {
                "session_message": "reauth",
                "session_required_identities": ["abc"],
            },
        }));
        let gare = inactive_reason(&job).unwrap();
        assert_eq!(
            unhandled_requirements(&gare),
            vec!["session_required_identities".to_owned()]
        );

        let err = check_requirements(&TIMER, &gare, true).unwrap_err();
        let err = err.downcast_ref::<AuthRequirementsError>().unwrap();
        assert!(err.message.starts_with("This timer has additional"));
        assert!(err
            .epilog
            .as_deref()
            .unwrap()
            .contains(&format!("globus timer resume --skip-inactive-reason-check {TIMER}")));
    }

    #[test]
    fn intervals() {
        assert_eq!(format_interval(90), "0:01:30");
        assert_eq!(format_interval(86400), "1 day, 0:00:00");
        assert_eq!(format_interval(3 * 86400 + 7200), "3 days, 2:00:00");
    }
}
