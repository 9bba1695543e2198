//! Driver for the external ACME client (certbot)
//!
//! The runner owns an ephemeral working tree (`config`, `work`, `logs`), builds argument
//! vectors token by token, executes the tool through a [`CommandExecutor`] and locates the
//! PEM files a successful run produced.

pub mod command;
mod errors;
pub mod executor;
pub mod resolver;
mod runner;

pub use command::{ObtainRequest, RegisterRequest, WorkingTree};
pub use errors::IssuerError;
pub use executor::{CommandExecutor, CommandInvocation, CommandOutput, TokioCommandExecutor};
pub use resolver::{CertificatePaths, OutputResolver};
pub use runner::{CertbotRunner, CertificateIssuer};
