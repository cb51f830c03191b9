use std::fmt;

/// Where a module is distributed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// `https://deno.land/std@<version>/<name>/...`
    StandardLibrary,
    /// `https://deno.land/x/<name>@<version>/...`
    ThirdParty,
}

impl ModuleKind {
    pub fn is_standard_library(self) -> bool {
        matches!(self, ModuleKind::StandardLibrary)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleKind::StandardLibrary => "std",
            ModuleKind::ThirdParty => "third-party",
        };
        f.write_str(label)
    }
}

/// One dependency declaration recovered from the manifest.
///
/// `imported_version` and `import_url` are verbatim slices of the manifest
/// text; the rewriter anchors on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub name: String,
    pub kind: ModuleKind,
    pub imported_version: String,
    pub import_url: String,
    pub repository_url: Option<String>,
    pub latest_version: Option<String>,
}

impl ModuleRecord {
    /// Build a record, rejecting field combinations the rewriter could not anchor on.
    pub fn new(
        name: impl Into<String>,
        kind: ModuleKind,
        imported_version: impl Into<String>,
        import_url: impl Into<String>,
    ) -> Result<Self, String> {
        let record = Self {
            name: name.into(),
            kind,
            imported_version: imported_version.into(),
            import_url: import_url.into(),
            repository_url: None,
            latest_version: None,
        };
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("module name is empty".to_string());
        }
        if self.imported_version.is_empty() {
            return Err(format!("module '{}' has an empty version", self.name));
        }
        if self.import_url.is_empty() {
            return Err(format!("module '{}' has an empty import URL", self.name));
        }
        if !self.import_url.contains(&self.name)
            || !self.import_url.contains(&self.imported_version)
        {
            return Err(format!(
                "import URL '{}' does not contain '{}' at '{}'",
                self.import_url, self.name, self.imported_version
            ));
        }
        Ok(())
    }

    pub fn is_standard_library(&self) -> bool {
        self.kind.is_standard_library()
    }

    /// Returns a copy enriched with the resolver's answer.
    pub fn with_resolution(&self, repository_url: Option<String>, latest_version: String) -> Self {
        Self {
            repository_url,
            latest_version: Some(latest_version),
            ..self.clone()
        }
    }

    /// Outdated iff a latest version is known and differs from the imported one.
    pub fn is_outdated(&self) -> bool {
        self.latest_version
            .as_deref()
            .is_some_and(|latest| latest != self.imported_version)
    }
}
