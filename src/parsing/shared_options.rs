use super::{
    batch::{parse_batch_source, BatchSource},
    datetime::{format_deadline, parse_datetime},
    identity::{parse_identity, ParsedIdentity},
    notify::{parse_notify, Notify, NotifyFlags},
    status_map::parse_exit_code,
};
use crate::usage_error;
use time::PrimitiveDateTime;

/// Options shared by both transfer and delete task submission
#[derive(clap::Args, Debug, Clone)]
pub struct TaskSubmissionOptions {
    /// Don't actually submit the task, print submission data instead
    #[arg(long)]
    pub dry_run: bool,
    /// Comma separated list of task events which notify by email.
    /// 'on' and 'off' may be used to enable or disable notifications for all
    /// event types. Otherwise, use 'succeeded', 'failed', or 'inactive'.
    #[arg(long, value_parser = parse_notify)]
    pub notify: Option<Notify>,
    /// Task submission ID, as generated by `globus task generate-submission-id`.
    /// Used for safe resubmission in the presence of network failures.
    #[arg(long)]
    pub submission_id: Option<String>,
    /// Set a label for this task.
    #[arg(long)]
    pub label: Option<String>,
    /// Set a deadline for this to be canceled if not completed by.
    #[arg(long, value_parser = parse_datetime)]
    pub deadline: Option<PrimitiveDateTime>,
    /// Submit the task even if the endpoint(s) aren't currently activated.
    #[arg(long)]
    pub skip_activation_check: bool,
}

impl TaskSubmissionOptions {
    pub fn notify_flags(&self) -> NotifyFlags {
        NotifyFlags::from_option(self.notify.as_ref())
    }

    pub fn deadline_string(&self) -> anyhow::Result<Option<String>> {
        self.deadline.as_ref().map(format_deadline).transpose()
    }
}

/// Options which apply both to `globus delete` and `globus rm`
#[derive(clap::Args, Debug, Clone)]
pub struct DeleteAndRmOptions {
    /// Recursively delete dirs
    #[arg(short, long)]
    pub recursive: bool,
    /// Don't throw errors if the file or dir is absent
    #[arg(short = 'f', long)]
    pub ignore_missing: bool,
    /// Don't prompt when the trailing character is a "*".
    #[arg(long, visible_alias = "unsafe")]
    pub star_silent: bool,
    /// Enable expansion of *, ?, and [ ] characters in the last component of
    /// file paths, unless they are escaped with a preceding backslash, \
    #[arg(long, overrides_with = "no_enable_globs")]
    enable_globs: bool,
    /// Disable glob expansion in the last component of file paths
    #[arg(long, overrides_with = "enable_globs")]
    no_enable_globs: bool,
    /// Optional value passed to identity mapping specifying which local user
    /// account to map to. Only usable with Globus Connect Server v5 mapped
    /// collections.
    #[arg(long)]
    pub local_user: Option<String>,
}

impl DeleteAndRmOptions {
    /// Whether globs are enabled, given the command's default
    pub fn enable_globs(&self, default: bool) -> bool {
        if self.enable_globs {
            true
        } else if self.no_enable_globs {
            false
        } else {
            default
        }
    }
}

/// `--batch` input for commands which accept it
#[derive(clap::Args, Debug, Clone)]
pub struct BatchOption {
    /// Accept a batch of paths from a file. Use `-` to read from stdin.
    #[arg(long, value_name = "FILE", value_parser = parse_batch_source)]
    pub batch: Option<BatchSource>,
}

fn parse_polling_interval(value: &str) -> Result<u64, String> {
    let v: i64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a valid integer"))?;
    if v < 1 {
        return Err(format!("--polling-interval={v} was less than minimum of 1"));
    }
    Ok(v as u64)
}

/// Options for commands which wait on a task to complete
#[derive(clap::Args, Debug, Clone)]
pub struct SynchronousTaskWaitOptions {
    /// Wait N seconds. If the Task does not terminate by then, or terminates
    /// with an unsuccessful status, exit with status 1
    #[arg(long, value_name = "N")]
    pub timeout: Option<u64>,
    /// Number of seconds between Task status checks.
    #[arg(long, default_value = "1", value_parser = parse_polling_interval)]
    pub polling_interval: u64,
    /// Every polling interval, print "." to stdout to indicate that task wait
    /// is still active
    #[arg(short = 'H', long)]
    pub heartbeat: bool,
    /// If the task times out, exit with this status code. Must have a value in
    /// 0,1,50-99
    #[arg(long, default_value = "1", value_parser = parse_exit_code)]
    pub timeout_exit_code: i32,
    #[arg(long, hide = true)]
    pub meow: bool,
}

/// A security principal which rules and roles are granted to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    Identity(ParsedIdentity),
    ProvisionIdentity(String),
    Group(String),
    Anonymous,
    AllAuthenticatedUsers,
}

impl Principal {
    pub fn principal_type(&self) -> &'static str {
        match self {
            Self::Identity(_) | Self::ProvisionIdentity(_) => "identity",
            Self::Group(_) => "group",
            Self::Anonymous => "anonymous",
            Self::AllAuthenticatedUsers => "all_authenticated_users",
        }
    }
}

/// `--identity` and `--group` principals
#[derive(clap::Args, Debug, Clone)]
pub struct SecurityPrincipalOpts {
    /// Identity to use as a security principal
    #[arg(long, value_name = "IDENTITY_ID_OR_NAME", value_parser = parse_identity)]
    pub identity: Option<ParsedIdentity>,
    /// Group to use as a security principal
    #[arg(long, value_name = "GROUP_ID")]
    pub group: Option<String>,
}

impl SecurityPrincipalOpts {
    pub fn principal(&self) -> anyhow::Result<Principal> {
        resolve_principal(self.identity.as_ref(), None, self.group.as_deref(), None)
    }
}

/// Principals for access rules, which may also be anonymous, any logged in
/// user, or an identity to be provisioned
#[derive(clap::Args, Debug, Clone)]
pub struct PermissionPrincipalOpts {
    #[command(flatten)]
    pub base: SecurityPrincipalOpts,
    /// Identity username to use as a security principal. Identity will be
    /// provisioned if it does not exist.
    #[arg(long, value_name = "IDENTITY_USERNAME")]
    pub provision_identity: Option<String>,
    /// Allow anyone access, even without logging in (treated as a security
    /// principal)
    #[arg(long, conflicts_with = "all_authenticated")]
    pub anonymous: bool,
    /// Allow anyone access, as long as they login (treated as a security
    /// principal)
    #[arg(long)]
    pub all_authenticated: bool,
}

impl PermissionPrincipalOpts {
    pub fn principal(&self) -> anyhow::Result<Principal> {
        let explicit = if self.anonymous {
            Some(Principal::Anonymous)
        } else if self.all_authenticated {
            Some(Principal::AllAuthenticatedUsers)
        } else {
            None
        };

        resolve_principal(
            self.base.identity.as_ref(),
            self.provision_identity.as_deref(),
            self.base.group.as_deref(),
            explicit,
        )
    }
}

fn resolve_principal(
    identity: Option<&ParsedIdentity>,
    provision_identity: Option<&str>,
    group: Option<&str>,
    explicit: Option<Principal>,
) -> anyhow::Result<Principal> {
    let has_identity = identity.is_some() || provision_identity.is_some();

    if identity.is_some() && provision_identity.is_some() {
        usage_error!("Only one of --identity or --provision-identity allowed");
    }

    if let Some(principal) = explicit {
        if has_identity || group.is_some() {
            usage_error!("You may only pass one security principal");
        }
        return Ok(principal);
    }

    match (identity, provision_identity, group) {
        (_, _, Some(_)) if has_identity => usage_error!(
            "You have passed both an identity and a group. Please only pass one principal type"
        ),
        (Some(identity), _, _) => Ok(Principal::Identity(identity.clone())),
        (None, Some(username), _) => Ok(Principal::ProvisionIdentity(username.to_owned())),
        (None, None, Some(group)) => Ok(Principal::Group(group.to_owned())),
        (None, None, None) => {
            usage_error!("You must provide at least one principal (identity, group, etc.)")
        }
    }
}

/// Option for commands that start auth flows and might need to disable the
/// default local server behavior
#[derive(clap::Args, Debug, Clone)]
pub struct NoLocalServerOption {
    /// Manual authorization by copying and pasting an auth code. This option
    /// is implied if the CLI detects you are using a remote connection.
    #[arg(long)]
    pub no_local_server: bool,
}
