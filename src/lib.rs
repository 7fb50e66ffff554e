pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod login;
pub mod parsing;
pub mod services;
pub mod termio;

/// The resource servers a command needs tokens for before it can run
pub trait RequiresLogin {
    fn resource_servers(&self) -> &'static [&'static str];
}

/// State shared by every command
pub struct Context {
    pub login_manager: login::LoginManager,
    pub printer: termio::Printer,
}
