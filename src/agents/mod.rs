pub mod manifest_parser;
pub mod manifest_rewriter;
pub mod module_record;
pub mod release_resolution;
pub mod update_selector;

pub use manifest_parser::{ManifestFile, ManifestParser, ParsedManifest};
pub use manifest_rewriter::{ManifestRewriter, RewriteOutcome, RewriteResult};
pub use release_resolution::{ResolutionReport, resolve_all};
pub use update_selector::{Selection, UpdateCandidate, UpdateKind, UpdateSelector};
