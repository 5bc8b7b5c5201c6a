pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, LogFormat};

pub use adapters::storage::LocalDocumentStore;
pub use config::RunConfig;
pub use core::orchestrator::{BatchOptions, BatchOrchestrator};
pub use core::rewriter::{RewriteOptions, Rewriter};
pub use domain::model::{Deployment, DeploymentMode, HostedBase, Operation};
pub use domain::report::Report;
pub use utils::error::{Result, RootfixError};
