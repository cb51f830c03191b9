pub mod deno_land;
pub mod version;

pub use deno_land::DenoLandResolver;
pub use version::VersionComparator;
