//! Request documents and multi-step helpers built on top of [`ServiceClient`](crate::client::ServiceClient)

pub mod auth;
pub mod gcs;
pub mod transfer;
