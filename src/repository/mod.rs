use crate::agents::module_record::ModuleRecord;
use crate::error::Result;
use std::time::Duration;

pub mod factory;
pub use factory::RepositoryFactory;

pub const DEFAULT_STD_REPOSITORY: &str = "https://github.com/denoland/deno_std";
pub const DEFAULT_DATABASE_URL: &str =
    "https://raw.githubusercontent.com/denoland/deno_website2/master/database.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Answers "where does this module live and what is its newest release".
///
/// Each call is one blocking lookup; implementations must be shareable across
/// the resolution threads.
pub trait ReleaseResolver: Send + Sync {
    fn resolve_repository(&self, record: &ModuleRecord) -> Result<String>;

    fn resolve_latest_version(&self, record: &ModuleRecord) -> Result<String>;
}

/// Explicit inputs for the deno.land resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub std_repository: String,
    pub database_url: String,
    /// Pins the std version instead of asking the std repository.
    pub std_version: Option<String>,
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            std_repository: DEFAULT_STD_REPOSITORY.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            std_version: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
