use crate::error::Result;
use crate::registry::DenoLandResolver;
use crate::repository::{ReleaseResolver, ResolverConfig};
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_deno_land(config: ResolverConfig) -> Result<Arc<dyn ReleaseResolver>> {
        let resolver = DenoLandResolver::new(config)?;
        Ok(Arc::new(resolver))
    }
}
