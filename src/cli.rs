use crate::repository::DEFAULT_TIMEOUT_SECS;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST: &str = "deps.ts";

const MANIFEST_EXTENSIONS: &[&str] = &["ts", "js", "tsx", "jsx", "mjs"];

#[derive(Parser, Debug)]
#[command(
    name = "dmm",
    about = "Deno Module Manager - check and update versioned deno.land imports",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Timeout in seconds for each registry request
    #[arg(long, global = true, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Use this standard library version instead of asking the std repository
    #[arg(long, global = true, value_name = "VERSION")]
    pub std_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check which modules have newer releases without modifying the manifest
    Check {
        /// Path to the dependency manifest
        #[arg(short, long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,

        /// Only check these modules (defaults to every module in the manifest)
        #[arg(value_name = "MODULE")]
        modules: Vec<String>,
    },

    /// Rewrite outdated module versions in the manifest
    Update {
        /// Optional manifest path followed by module names (defaults to deps.ts and all modules)
        #[arg(value_name = "MANIFEST_OR_MODULE")]
        args: Vec<String>,
    },

    /// Show details about a module, or list the modules declared in the manifest
    Info {
        /// Path to the dependency manifest
        #[arg(short, long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,

        /// Module to describe
        #[arg(value_name = "MODULE")]
        module: Option<String>,
    },
}

/// Split `update` positionals into the manifest path and module names.
///
/// The first positional is the manifest when it names an existing file or looks
/// like a script path; otherwise every positional is a module name.
pub fn split_update_args(args: &[String]) -> (PathBuf, Vec<String>) {
    match args.split_first() {
        Some((first, rest)) if looks_like_manifest(first) => (PathBuf::from(first), rest.to_vec()),
        _ => (PathBuf::from(DEFAULT_MANIFEST), args.to_vec()),
    }
}

fn looks_like_manifest(arg: &str) -> bool {
    let path = Path::new(arg);
    if path.is_file() || arg.contains('/') || arg.contains(std::path::MAIN_SEPARATOR) {
        return true;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn update_without_args_uses_default_manifest() {
        let (manifest, modules) = split_update_args(&[]);
        assert_eq!(manifest, PathBuf::from("deps.ts"));
        assert!(modules.is_empty());
    }

    #[test]
    fn update_with_manifest_and_modules() {
        let (manifest, modules) = split_update_args(&strings(&["src/deps.ts", "fs", "drash"]));
        assert_eq!(manifest, PathBuf::from("src/deps.ts"));
        assert_eq!(modules, strings(&["fs", "drash"]));
    }

    #[test]
    fn update_with_script_name_as_manifest() {
        let (manifest, modules) = split_update_args(&strings(&["dev_deps.ts"]));
        assert_eq!(manifest, PathBuf::from("dev_deps.ts"));
        assert!(modules.is_empty());
    }

    #[test]
    fn update_with_only_modules() {
        let (manifest, modules) = split_update_args(&strings(&["fs", "drash"]));
        assert_eq!(manifest, PathBuf::from("deps.ts"));
        assert_eq!(modules, strings(&["fs", "drash"]));
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dmm",
            "check",
            "fs",
            "--std-version",
            "0.60.0",
            "--timeout",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.std_version.as_deref(), Some("0.60.0"));
        assert_eq!(cli.timeout, 5);
        match cli.command {
            Commands::Check { manifest, modules } => {
                assert_eq!(manifest, PathBuf::from("deps.ts"));
                assert_eq!(modules, strings(&["fs"]));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
