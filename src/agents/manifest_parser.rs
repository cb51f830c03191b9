use crate::agents::module_record::{ModuleKind, ModuleRecord};
use crate::error::{DmmError, Result};
use crate::utils::path_validator::PathValidator;
use crate::utils::verbose;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Every import the tool manages is served from this host.
pub const HOSTING_MARKER: &str = "https://deno.land/";
/// Host match under any scheme, so plain-http imports are reported rather than skipped.
const HOST_MARKER: &str = "://deno.land/";
pub const STD_MARKER: &str = "/std@";
pub const REGISTRY_MARKER: &str = "/x/";

/// Why a line produced no record and no warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Blank,
    NoHostingMarker,
    DuplicateImport,
}

/// Classification of a single manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Recognized(ModuleRecord),
    Ignored(IgnoreReason),
    Malformed(String),
}

/// A line that referenced the hosting domain but could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-indexed
    pub line_number: usize,
    pub reason: String,
    pub raw: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    pub records: Vec<ModuleRecord>,
    pub malformed: Vec<MalformedLine>,
    /// Line numbers of imports whose URL was already recorded
    pub duplicates: Vec<usize>,
}

impl ParsedManifest {
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

/// A manifest read from disk, with the canonical path it was read from.
#[derive(Debug)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub raw: String,
    pub parsed: ParsedManifest,
}

/// Recovers module records from import/export statements.
pub struct ManifestParser {
    from_clause: Regex,
}

impl ManifestParser {
    pub fn new() -> Result<Self> {
        let from_clause = Regex::new(r#"\bfrom\s*(?:"([^"]*)"|'([^']*)'|`([^`]*)`)"#)
            .map_err(|e| DmmError::InvalidArgument(format!("Regex error: {}", e)))?;
        Ok(Self { from_clause })
    }

    /// Read and parse a manifest from disk.
    pub fn parse_file<P: AsRef<Path>>(
        &self,
        path: P,
        requested: &[String],
    ) -> Result<ManifestFile> {
        let path = PathValidator::validate_manifest_path(path)?;
        let raw = fs::read_to_string(&path).map_err(|e| DmmError::ManifestNotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        verbose::log(format!(
            "Read {} bytes from {}",
            raw.len(),
            path.display()
        ));

        let parsed = self.parse(&raw, requested);
        Ok(ManifestFile { path, raw, parsed })
    }

    /// Parse manifest text into records, keeping only `requested` names when non-empty.
    pub fn parse(&self, raw: &str, requested: &[String]) -> ParsedManifest {
        let filter: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut seen_urls = HashSet::new();
        let mut parsed = ParsedManifest::default();

        for (index, line) in raw.lines().enumerate() {
            let line_number = index + 1;
            for outcome in self.classify_line(line) {
                let outcome = match outcome {
                    LineOutcome::Recognized(record)
                        if !seen_urls.insert(record.import_url.clone()) =>
                    {
                        LineOutcome::Ignored(IgnoreReason::DuplicateImport)
                    }
                    other => other,
                };

                match outcome {
                    LineOutcome::Recognized(record) => {
                        if filter.is_empty() || filter.contains(record.name.as_str()) {
                            parsed.records.push(record);
                        }
                    }
                    LineOutcome::Malformed(reason) => parsed.malformed.push(MalformedLine {
                        line_number,
                        reason,
                        raw: line.to_string(),
                    }),
                    LineOutcome::Ignored(IgnoreReason::DuplicateImport) => {
                        parsed.duplicates.push(line_number)
                    }
                    LineOutcome::Ignored(_) => {}
                }
            }
        }

        parsed
    }

    /// Classify one line without regard to earlier lines, one outcome per `from` clause.
    pub fn classify_line(&self, line: &str) -> Vec<LineOutcome> {
        if line.trim().is_empty() {
            return vec![LineOutcome::Ignored(IgnoreReason::Blank)];
        }

        let outcomes: Vec<LineOutcome> = self
            .import_urls(line)
            .map(Self::classify_import_url)
            .collect();

        if outcomes.is_empty() {
            vec![LineOutcome::Ignored(IgnoreReason::NoHostingMarker)]
        } else {
            outcomes
        }
    }

    fn import_urls<'a>(&'a self, line: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.from_clause.captures_iter(line).filter_map(|cap| {
            let url = cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3))?;
            url.as_str().contains(HOST_MARKER).then_some(url.as_str())
        })
    }

    fn classify_import_url(import_url: &str) -> LineOutcome {
        let parsed = if !import_url.starts_with(HOSTING_MARKER) {
            Err(format!("'{}' is not an {} import", import_url, HOSTING_MARKER))
        } else if import_url.contains(STD_MARKER) {
            Self::parse_standard_library(import_url)
        } else if import_url.contains(REGISTRY_MARKER) {
            Self::parse_third_party(import_url)
        } else {
            Err(format!("unrecognized deno.land layout in '{}'", import_url))
        };

        match parsed {
            Ok(record) => LineOutcome::Recognized(record),
            Err(reason) => LineOutcome::Malformed(reason),
        }
    }

    /// `https://deno.land/std@<version>/<name>/<entry>`
    fn parse_standard_library(import_url: &str) -> std::result::Result<ModuleRecord, String> {
        let start = import_url
            .find(STD_MARKER)
            .ok_or_else(|| format!("missing '{}' in '{}'", STD_MARKER, import_url))?;
        let rest = &import_url[start + STD_MARKER.len()..];

        let (version, after_version) = rest
            .split_once('/')
            .ok_or_else(|| format!("std import '{}' has no module path", import_url))?;
        let (name, _entry) = after_version.split_once('/').ok_or_else(|| {
            format!(
                "std import '{}' does not name a module directory",
                import_url
            )
        })?;

        ModuleRecord::new(name, ModuleKind::StandardLibrary, version, import_url)
    }

    /// `https://deno.land/x/<name>@<version>/<entry>`
    fn parse_third_party(import_url: &str) -> std::result::Result<ModuleRecord, String> {
        let start = import_url
            .find(REGISTRY_MARKER)
            .ok_or_else(|| format!("missing '{}' in '{}'", REGISTRY_MARKER, import_url))?;
        let rest = &import_url[start + REGISTRY_MARKER.len()..];

        let (segment, _entry) = rest
            .split_once('/')
            .ok_or_else(|| format!("import '{}' has no entry point", import_url))?;
        let (name, version) = segment
            .rsplit_once('@')
            .ok_or_else(|| format!("unversioned import '{}'", import_url))?;

        ModuleRecord::new(name, ModuleKind::ThirdParty, version, import_url)
    }
}
