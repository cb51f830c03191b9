use crate::agents::{
    ManifestFile, ManifestParser, ManifestRewriter, ParsedManifest, ResolutionReport,
    RewriteOutcome, RewriteResult, Selection, UpdateCandidate, UpdateKind, UpdateSelector,
    resolve_all,
};
use crate::error::Result;
use crate::registry::DenoLandResolver;
use crate::repository::{ReleaseResolver, RepositoryFactory, ResolverConfig};
use crate::utils::verbose;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything learned about a manifest without modifying it.
#[derive(Debug)]
pub struct CheckOutcome {
    pub manifest_path: PathBuf,
    pub raw: String,
    pub parsed: ParsedManifest,
    pub unmatched: Vec<String>,
    pub resolution: ResolutionReport,
    pub selection: Selection,
}

#[derive(Debug)]
pub struct UpdateOutcome {
    pub check: CheckOutcome,
    pub rewrite: RewriteResult,
    pub written: bool,
}

/// Parse, filter, resolve, and select.
pub fn check_manifest(
    manifest_path: &Path,
    modules: &[String],
    resolver: &dyn ReleaseResolver,
) -> Result<CheckOutcome> {
    let parser = ManifestParser::new()?;
    let ManifestFile { path, raw, parsed } = parser.parse_file(manifest_path, modules)?;
    verbose::log(format!("Modules: {}", parsed.names().join(", ")));

    let unmatched = UpdateSelector::ensure_matches(modules, &parsed)?;
    let resolution = resolve_all(&parsed.records, resolver);
    let selection = UpdateSelector::select(&resolution.resolved);

    Ok(CheckOutcome {
        manifest_path: path,
        raw,
        parsed,
        unmatched,
        resolution,
        selection,
    })
}

/// Check, then rewrite the manifest in a single write when anything changed.
pub fn update_manifest(
    manifest_path: &Path,
    modules: &[String],
    resolver: &dyn ReleaseResolver,
) -> Result<UpdateOutcome> {
    let check = check_manifest(manifest_path, modules, resolver)?;
    let rewrite = ManifestRewriter::rewrite(&check.raw, &check.selection.updatable_records());

    let written = rewrite.is_changed();
    if written {
        fs::write(&check.manifest_path, &rewrite.text)?;
        verbose::log(format!(
            "Wrote {} bytes to {}",
            rewrite.text.len(),
            check.manifest_path.display()
        ));
    }

    Ok(UpdateOutcome {
        check,
        rewrite,
        written,
    })
}

/// Execute the check workflow (dry-run)
pub fn execute_check(
    manifest_path: &Path,
    modules: &[String],
    config: ResolverConfig,
) -> Result<()> {
    println!("{}", "Checking for available updates...".cyan().bold());
    println!(
        "\n{}",
        format!("1. Reading {}...", manifest_path.display()).yellow()
    );

    let resolver = RepositoryFactory::create_deno_land(config)?;
    let outcome = check_manifest(manifest_path, modules, resolver.as_ref())?;

    print_parse_summary(&outcome);
    print_resolution_failures(&outcome.resolution);
    print_available_updates(&outcome.selection);

    Ok(())
}

/// Execute the update workflow
pub fn execute_update(
    manifest_path: &Path,
    modules: &[String],
    config: ResolverConfig,
) -> Result<()> {
    println!("{}", "Starting module update process...".cyan().bold());
    println!(
        "\n{}",
        format!("1. Reading {}...", manifest_path.display()).yellow()
    );

    let resolver = RepositoryFactory::create_deno_land(config)?;
    let outcome = update_manifest(manifest_path, modules, resolver.as_ref())?;

    print_parse_summary(&outcome.check);
    print_update_report(&outcome);
    print_resolution_failures(&outcome.check.resolution);

    let mismatches = outcome.rewrite.mismatches().count();
    if mismatches > 0 {
        println!(
            "\n{}",
            format!("⚠ {} module(s) could not be rewritten", mismatches).yellow()
        );
    }

    if outcome.written {
        println!(
            "\n{}",
            format!(
                "✨ Updated {} module(s) in {}",
                outcome.rewrite.applied_count(),
                outcome.check.manifest_path.display()
            )
            .green()
            .bold()
        );
    } else {
        println!("\n{}", "No updates were applied".yellow());
    }

    Ok(())
}

/// Execute the info workflow: one module in detail, or every declared module.
pub fn execute_info(
    manifest_path: &Path,
    module: Option<&str>,
    config: ResolverConfig,
) -> Result<()> {
    match module {
        Some(name) => {
            println!(
                "{}",
                format!("Fetching information for '{}'...", name).cyan().bold()
            );
            let resolver = DenoLandResolver::new(config)?;
            let info = resolver.module_info(name)?;

            println!("\n  {} {}", "Name:".bold(), info.name.white().bold());
            println!("  {} {}", "Kind:".bold(), info.kind);
            if let Some(description) = &info.description {
                println!("  {} {}", "Description:".bold(), description);
            }
            println!("  {} {}", "Repository:".bold(), info.repository_url.dimmed());
            println!(
                "  {} {}",
                "Latest version:".bold(),
                info.latest_version.green().bold()
            );
            println!(
                "  {} import * as {} from \"{}\";",
                "Import:".bold(),
                info.name,
                info.import_url()
            );
        }
        None => {
            println!(
                "{}",
                format!("Listing modules in {}...", manifest_path.display())
                    .cyan()
                    .bold()
            );
            let parser = ManifestParser::new()?;
            let manifest = parser.parse_file(manifest_path, &[])?;
            print_malformed(&manifest.parsed);
            print_module_list(&manifest.parsed);
        }
    }

    Ok(())
}

fn print_parse_summary(outcome: &CheckOutcome) {
    print_malformed(&outcome.parsed);

    for name in &outcome.unmatched {
        println!(
            "{}",
            format!("⚠ '{}' is not declared in the manifest", name).yellow()
        );
    }

    println!(
        "   Found {} module(s):",
        outcome.parsed.records.len().to_string().bright_cyan()
    );
    for record in &outcome.parsed.records {
        println!(
            "   • {} {} ({})",
            record.name.bright_cyan(),
            record.imported_version.dimmed(),
            record.kind
        );
    }

    println!("\n{}", "2. Resolving latest releases...".yellow());
    println!(
        "{}",
        format!(
            "✓ Resolved {} of {} module(s)",
            outcome.resolution.resolved.len(),
            outcome.parsed.records.len()
        )
        .green()
    );
}

fn print_malformed(parsed: &ParsedManifest) {
    for line in &parsed.malformed {
        println!(
            "{} line {}: {}",
            "⚠ Skipping".yellow(),
            line.line_number,
            line.reason
        );
        println!("    {}", line.raw.trim().dimmed());
    }

    for line_number in &parsed.duplicates {
        verbose::log(format!(
            "Line {}: import already declared earlier, skipped",
            line_number
        ));
    }
}

fn print_module_list(parsed: &ParsedManifest) {
    let (std_modules, third_party): (Vec<_>, Vec<_>) = parsed
        .records
        .iter()
        .partition(|record| record.is_standard_library());

    if !std_modules.is_empty() {
        println!("\n{}", "Standard library:".yellow().bold());
        for record in &std_modules {
            println!("  {}", format!("{}@{}", record.name, record.imported_version).cyan());
        }
    }

    if !third_party.is_empty() {
        println!("\n{}", "Third-party:".yellow().bold());
        for record in &third_party {
            println!(
                "  {}",
                format!("{}@{}", record.name, record.imported_version).magenta()
            );
        }
    }

    println!("\n{}", "Summary:".cyan().bold());
    println!("  {} std modules", std_modules.len().to_string().yellow());
    println!("  {} third-party modules", third_party.len().to_string().yellow());
}

fn print_available_updates(selection: &Selection) {
    if selection.is_up_to_date() {
        println!("\n{}", "✨ All modules are up to date!".green().bold());
        return;
    }

    println!("\n{}", "📦 Available Updates:".cyan().bold());
    println!(
        "{}",
        format!("Found {} update(s)", selection.updatable.len()).yellow()
    );

    for candidate in &selection.updatable {
        let stability = if candidate.stable {
            "stable".green()
        } else {
            "pre-release".yellow()
        };
        let direction = match candidate.kind {
            UpdateKind::Upgrade => String::new(),
            UpdateKind::Downgrade => format!(" {}", "older than imported".red()),
            UpdateKind::Changed => format!(" {}", "unordered tag".dimmed()),
        };
        println!(
            "  • {} can be updated from {} to {} ({}){}",
            candidate.record.name.white().bold(),
            candidate.record.imported_version.red(),
            candidate.latest_version.green().bold(),
            stability,
            direction
        );
    }

    for record in &selection.current {
        println!("  • {} is up to date", record.name.dimmed());
    }

    println!("\n{}", "To apply these updates, run:".dimmed());
    println!("  {}", "dmm update".cyan());
}

fn print_update_report(outcome: &UpdateOutcome) {
    println!("\n{}", "3. Rewriting manifest...".yellow());

    for entry in &outcome.rewrite.entries {
        match &entry.outcome {
            RewriteOutcome::Applied {
                from,
                to,
                occurrences,
            } => {
                if let Some(candidate) = candidate_for(&outcome.check.selection, from) {
                    println!(
                        "  {} {} was updated from {} to {}",
                        "✓".green(),
                        entry.name.white().bold(),
                        candidate.record.imported_version.red(),
                        candidate.latest_version.green()
                    );
                }
                verbose::log(format!("{} -> {} ({} occurrence(s))", from, to, occurrences));
            }
            RewriteOutcome::Skipped => {
                println!("  • {} is up to date", entry.name.dimmed());
            }
            RewriteOutcome::Mismatch(reason) => {
                verbose::log(format!("Rewrite mismatch for {}", entry.import_url));
                println!(
                    "  {} {} left untouched: {}",
                    "⚠".yellow(),
                    entry.name.yellow().bold(),
                    reason
                );
            }
        }
    }

    for record in &outcome.check.selection.current {
        println!("  • {} is up to date", record.name.dimmed());
    }
}

fn candidate_for<'a>(selection: &'a Selection, import_url: &str) -> Option<&'a UpdateCandidate> {
    selection
        .updatable
        .iter()
        .find(|c| c.record.import_url == import_url)
}

fn print_resolution_failures(resolution: &ResolutionReport) {
    if !resolution.has_failures() {
        return;
    }

    println!(
        "\n{}",
        format!(
            "⚠ Could not resolve {} module(s):",
            resolution.failures.len()
        )
        .red()
        .bold()
    );
    for failure in &resolution.failures {
        println!("  • {} {}", failure.name.red(), failure.reason.dimmed());
        verbose::log(format!("Unresolved import: {}", failure.import_url));
    }
}
