pub mod classifier;
pub mod hardening;
pub mod injector;
pub mod normalizer;
pub mod orchestrator;
pub mod rewriter;
pub mod scanner;
pub mod transaction;

pub use crate::domain::ports::{DocumentJob, DocumentStore};
pub use crate::utils::error::Result;
