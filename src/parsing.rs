//! Parameter types and option groups shared between commands

pub mod batch;
pub mod choice;
pub mod datetime;
pub mod endpoint_path;
pub mod identity;
pub mod notify;
pub mod nullable;
pub mod shared_options;
pub mod status_map;
pub mod timedelta;

pub use endpoint_path::{parse_endpoint_plus_optpath, parse_endpoint_plus_reqpath, EndpointPath};
pub use identity::{parse_identity, ParsedIdentity};
pub use nullable::{parse_string_or_null, parse_url_or_null, Nullable};
pub use shared_options::{
    BatchOption, DeleteAndRmOptions, NoLocalServerOption, PermissionPrincipalOpts, Principal,
    SecurityPrincipalOpts, SynchronousTaskWaitOptions, TaskSubmissionOptions,
};
pub use status_map::HttpStatusMap;
pub use timedelta::{parse_timedelta, parse_timedelta_seconds};
