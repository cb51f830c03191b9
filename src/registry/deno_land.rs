use crate::agents::manifest_parser::HOSTING_MARKER;
use crate::agents::module_record::{ModuleKind, ModuleRecord};
use crate::error::{DmmError, Result};
use crate::repository::{ReleaseResolver, ResolverConfig};
use crate::utils::verbose;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use url::Url;

const MAX_DATABASE_BYTES: usize = 10 * 1024 * 1024;

/// Top-level directories of the standard library.
pub const STD_MODULES: &[&str] = &[
    "archive",
    "async",
    "bytes",
    "datetime",
    "encoding",
    "flags",
    "fmt",
    "fs",
    "hash",
    "http",
    "io",
    "log",
    "mime",
    "node",
    "path",
    "permissions",
    "signal",
    "testing",
    "textproto",
    "uuid",
    "ws",
];

/// What `info` reports about a single module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub kind: ModuleKind,
    pub description: Option<String>,
    pub repository_url: String,
    pub latest_version: String,
}

impl ModuleInfo {
    pub fn import_url(&self) -> String {
        match self.kind {
            ModuleKind::StandardLibrary => format!(
                "{}std@{}/{}/mod.ts",
                HOSTING_MARKER, self.latest_version, self.name
            ),
            ModuleKind::ThirdParty => format!(
                "{}x/{}@{}/mod.ts",
                HOSTING_MARKER, self.name, self.latest_version
            ),
        }
    }
}

/// One module entry of the deno.land module database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub desc: Option<String>,
}

type ModuleDatabase = HashMap<String, DatabaseEntry>;

/// A fetch result kept for the rest of the run; failures keep their message.
type Cached<T> = Mutex<Option<std::result::Result<T, String>>>;

/// Resolves deno.land modules to GitHub repositories and their latest release tags.
///
/// The module database and the std release tag are fetched at most once per
/// resolver and shared between threads. A failed fetch is not retried.
pub struct DenoLandResolver {
    client: Client,
    config: ResolverConfig,
    database: Cached<Arc<ModuleDatabase>>,
    std_latest: Cached<String>,
}

impl DenoLandResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        Self::validate_repository_url(&config.std_repository)?;
        Self::validate_repository_url(&config.database_url)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("dmm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            database: Mutex::new(None),
            std_latest: Mutex::new(None),
        })
    }

    /// Describe a module by name, std modules first.
    pub fn module_info(&self, name: &str) -> Result<ModuleInfo> {
        if STD_MODULES.contains(&name) {
            return Ok(ModuleInfo {
                name: name.to_string(),
                kind: ModuleKind::StandardLibrary,
                description: None,
                repository_url: self.config.std_repository.clone(),
                latest_version: self.std_latest_version()?,
            });
        }

        let entry = self.database_entry(name)?;
        let repository_url = Self::repository_url(name, &entry)?;
        let latest_version = self
            .latest_release_tag(&repository_url)
            .map_err(|e| DmmError::resolution(name, e.to_string()))?;

        Ok(ModuleInfo {
            name: name.to_string(),
            kind: ModuleKind::ThirdParty,
            description: entry.desc,
            repository_url,
            latest_version,
        })
    }

    /// Look up a third-party module in the module database.
    pub fn database_entry(&self, name: &str) -> Result<DatabaseEntry> {
        let database = self.fetch_database()?;
        database.get(name).cloned().ok_or_else(|| {
            DmmError::resolution(name, "module is not listed in the deno.land database")
        })
    }

    /// Latest std release, pinned by configuration or read from the std repository once.
    pub fn std_latest_version(&self) -> Result<String> {
        if let Some(pinned) = &self.config.std_version {
            return Ok(pinned.clone());
        }

        let mut cached = self
            .std_latest
            .lock()
            .map_err(|_| DmmError::Registry("std version cache is poisoned".to_string()))?;
        let outcome = cached.get_or_insert_with(|| {
            let fetched = self
                .latest_release_tag(&self.config.std_repository)
                .map_err(|e| e.to_string());
            if let Ok(version) = &fetched {
                verbose::log(format!("Latest std release: {}", version));
            }
            fetched
        });

        outcome
            .clone()
            .map_err(|reason| DmmError::resolution("std", reason))
    }

    fn fetch_database(&self) -> Result<Arc<ModuleDatabase>> {
        let mut cached = self
            .database
            .lock()
            .map_err(|_| DmmError::Registry("module database cache is poisoned".to_string()))?;
        let outcome =
            cached.get_or_insert_with(|| self.download_database().map_err(|e| e.to_string()));

        outcome.clone().map_err(|reason| DmmError::Unavailable {
            url: self.config.database_url.clone(),
            reason,
        })
    }

    fn download_database(&self) -> Result<Arc<ModuleDatabase>> {
        verbose::log(format!("Fetching: {}", self.config.database_url));
        let response = self.client.get(&self.config.database_url).send()?;
        if !response.status().is_success() {
            return Err(DmmError::Registry(format!(
                "HTTP {} while fetching {}",
                response.status(),
                self.config.database_url
            )));
        }

        let text = response.text()?;
        if text.len() > MAX_DATABASE_BYTES {
            return Err(DmmError::Registry(
                "Module database response exceeded 10MB limit".to_string(),
            ));
        }

        let database: Arc<ModuleDatabase> = Arc::new(serde_json::from_str(&text)?);
        verbose::log(format!("Module database lists {} modules", database.len()));
        Ok(database)
    }

    fn repository_url(name: &str, entry: &DatabaseEntry) -> Result<String> {
        if entry.kind != "github" {
            return Err(DmmError::resolution(
                name,
                format!("unsupported repository type '{}'", entry.kind),
            ));
        }

        match (&entry.owner, &entry.repo) {
            (Some(owner), Some(repo)) => {
                let url = format!("https://github.com/{}/{}", owner, repo);
                Self::validate_repository_url(&url)?;
                Ok(url)
            }
            _ => Err(DmmError::resolution(
                name,
                "database entry has no owner/repo",
            )),
        }
    }

    /// Follow `<repository>/releases/latest` and return the tag it redirects to.
    fn latest_release_tag(&self, repository_url: &str) -> Result<String> {
        let latest_url = format!("{}/releases/latest", repository_url.trim_end_matches('/'));
        verbose::log(format!("Fetching: {}", latest_url));

        let response = self.client.get(&latest_url).send()?;
        if !response.status().is_success() {
            return Err(DmmError::Registry(format!(
                "HTTP {} while fetching {}",
                response.status(),
                latest_url
            )));
        }

        let final_url = response.url().clone();
        verbose::log(format!("Redirected to: {}", final_url));

        Self::tag_from_release_url(&final_url).ok_or_else(|| {
            DmmError::Registry(format!("{} has no published releases", repository_url))
        })
    }

    /// `https://github.com/<owner>/<repo>/releases/tag/<tag>` -> `<tag>`'s last segment.
    fn tag_from_release_url(url: &Url) -> Option<String> {
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        let tag_index = segments
            .windows(2)
            .position(|pair| pair == ["releases", "tag"])?;

        segments
            .get(tag_index + 2..)
            .and_then(|rest| rest.last())
            .map(|tag| tag.to_string())
    }

    fn validate_repository_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|_| DmmError::InvalidArgument(format!("Invalid repository URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(DmmError::InvalidArgument(format!(
                    "Unsupported repository scheme: {scheme}"
                )));
            }
        }

        if let Some(host) = parsed.host_str() {
            if Self::is_private_host(host) {
                return Err(DmmError::InvalidArgument(format!(
                    "Repository host '{host}' is not allowed"
                )));
            }
        }

        Ok(())
    }

    fn is_private_host(host: &str) -> bool {
        if host.eq_ignore_ascii_case("localhost") {
            return true;
        }

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            match ip {
                IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
                IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local(),
            }
        } else {
            false
        }
    }
}

impl ReleaseResolver for DenoLandResolver {
    fn resolve_repository(&self, record: &ModuleRecord) -> Result<String> {
        if record.is_standard_library() {
            return Ok(self.config.std_repository.clone());
        }

        let entry = self.database_entry(&record.name)?;
        Self::repository_url(&record.name, &entry)
    }

    fn resolve_latest_version(&self, record: &ModuleRecord) -> Result<String> {
        if record.is_standard_library() {
            return self.std_latest_version();
        }

        let repository = match &record.repository_url {
            Some(url) => url.clone(),
            None => self.resolve_repository(record)?,
        };

        self.latest_release_tag(&repository)
            .map_err(|e| DmmError::resolution(&record.name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn pinned_resolver() -> DenoLandResolver {
        DenoLandResolver::new(ResolverConfig {
            std_version: Some("0.60.0".to_string()),
            ..ResolverConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn extracts_tag_from_release_redirect() {
        let url = Url::parse("https://github.com/drashland/deno-drash/releases/tag/v1.2.0").unwrap();
        assert_eq!(
            DenoLandResolver::tag_from_release_url(&url),
            Some("v1.2.0".to_string())
        );
    }

    #[test]
    fn extracts_terminal_segment_of_nested_tag() {
        let url = Url::parse("https://github.com/denoland/deno/releases/tag/std/0.60.0").unwrap();
        assert_eq!(
            DenoLandResolver::tag_from_release_url(&url),
            Some("0.60.0".to_string())
        );
    }

    #[test]
    fn release_listing_without_tag_has_no_version() {
        let url = Url::parse("https://github.com/owner/repo/releases").unwrap();
        assert_eq!(DenoLandResolver::tag_from_release_url(&url), None);
    }

    #[test]
    fn github_entry_maps_to_repository_url() {
        let database: ModuleDatabase = serde_json::from_str(
            r#"{
                "drash": { "type": "github", "owner": "drashland", "repo": "deno-drash", "desc": "A REST microframework" },
                "legacy": { "type": "url", "url": "https://example.com/legacy" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            DenoLandResolver::repository_url("drash", &database["drash"]).unwrap(),
            "https://github.com/drashland/deno-drash"
        );
        let err = DenoLandResolver::repository_url("legacy", &database["legacy"]).unwrap_err();
        assert!(matches!(err, DmmError::Resolution { .. }));
    }

    #[test]
    fn pinned_std_version_needs_no_network() {
        let resolver = pinned_resolver();
        let fs = ModuleRecord::new(
            "fs",
            ModuleKind::StandardLibrary,
            "0.50.0",
            "https://deno.land/std@0.50.0/fs/mod.ts",
        )
        .unwrap();

        assert_eq!(resolver.resolve_latest_version(&fs).unwrap(), "0.60.0");
        assert_eq!(
            resolver.resolve_repository(&fs).unwrap(),
            "https://github.com/denoland/deno_std"
        );
    }

    #[test]
    fn std_module_info_uses_pinned_version() {
        let info = pinned_resolver().module_info("fs").unwrap();
        assert_eq!(info.kind, ModuleKind::StandardLibrary);
        assert_eq!(info.import_url(), "https://deno.land/std@0.60.0/fs/mod.ts");
    }

    #[test]
    fn third_party_import_url() {
        let info = ModuleInfo {
            name: "drash".to_string(),
            kind: ModuleKind::ThirdParty,
            description: None,
            repository_url: "https://github.com/drashland/deno-drash".to_string(),
            latest_version: "v1.2.0".to_string(),
        };
        assert_eq!(info.import_url(), "https://deno.land/x/drash@v1.2.0/mod.ts");
    }

    #[test]
    fn rejects_private_repository_hosts() {
        let err = DenoLandResolver::new(ResolverConfig {
            database_url: "https://127.0.0.1/database.json".to_string(),
            ..ResolverConfig::default()
        });
        assert!(matches!(err, Err(DmmError::InvalidArgument(_))));
    }

    /// Serves `500` to every request and counts the connections it accepted.
    fn failing_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });

        (address, hits)
    }

    #[test]
    fn failed_fetches_are_not_retried() {
        let (address, hits) = failing_server();
        // Built directly: `new` refuses loopback hosts.
        let resolver = DenoLandResolver {
            client: Client::builder().no_proxy().build().unwrap(),
            config: ResolverConfig {
                std_repository: format!("{address}/denoland/deno_std"),
                database_url: format!("{address}/database.json"),
                ..ResolverConfig::default()
            },
            database: Mutex::new(None),
            std_latest: Mutex::new(None),
        };

        for name in ["alpha", "beta", "gamma"] {
            let err = resolver.database_entry(name).unwrap_err();
            assert!(matches!(err, DmmError::Unavailable { .. }));
            assert!(err.to_string().contains("HTTP 500"));
        }
        for _ in 0..3 {
            let err = resolver.std_latest_version().unwrap_err();
            assert!(matches!(err, DmmError::Resolution { .. }));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejects_invalid_scheme() {
        let err = DenoLandResolver::validate_repository_url("ftp://example.com").unwrap_err();
        assert!(matches!(err, DmmError::InvalidArgument(_)));
    }

    #[test]
    #[ignore] // Requires network access
    fn resolves_third_party_release() {
        let resolver = DenoLandResolver::new(ResolverConfig::default()).unwrap();
        let record = ModuleRecord::new(
            "drash",
            ModuleKind::ThirdParty,
            "v1.0.0",
            "https://deno.land/x/drash@v1.0.0/mod.ts",
        )
        .unwrap();
        let latest = resolver.resolve_latest_version(&record).unwrap();
        assert!(!latest.is_empty());
    }
}
