use crate::agents::manifest_parser::{REGISTRY_MARKER, STD_MARKER};
use crate::agents::module_record::ModuleRecord;

const QUOTES: [char; 3] = ['"', '\'', '`'];

/// The text pair swapped inside a record's import URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub old: String,
    pub new: String,
}

impl Fragment {
    /// `std@<v>/<name>` for std modules, `<name>@<v>` for registry modules.
    pub fn for_record(record: &ModuleRecord, latest_version: &str) -> Self {
        if record.is_standard_library() {
            Self {
                old: format!("std@{}/{}", record.imported_version, record.name),
                new: format!("std@{}/{}", latest_version, record.name),
            }
        } else {
            Self {
                old: format!("{}@{}", record.name, record.imported_version),
                new: format!("{}@{}", record.name, latest_version),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Applied {
        from: String,
        to: String,
        occurrences: usize,
    },
    /// Already at the latest version, or never resolved.
    Skipped,
    /// The record could not be located; the text was left untouched for it.
    Mismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteEntry {
    pub name: String,
    pub import_url: String,
    pub outcome: RewriteOutcome,
}

#[derive(Debug, Clone)]
pub struct RewriteResult {
    pub text: String,
    pub entries: Vec<RewriteEntry>,
}

impl RewriteResult {
    pub fn applied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, RewriteOutcome::Applied { .. }))
            .count()
    }

    pub fn is_changed(&self) -> bool {
        self.applied_count() > 0
    }

    pub fn mismatches(&self) -> impl Iterator<Item = (&RewriteEntry, &str)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            RewriteOutcome::Mismatch(reason) => Some((e, reason.as_str())),
            _ => None,
        })
    }
}

/// Applies version substitutions to manifest text, touching nothing but the
/// import URLs of the records it is given.
pub struct ManifestRewriter;

impl ManifestRewriter {
    pub fn rewrite(raw: &str, records: &[ModuleRecord]) -> RewriteResult {
        let mut text = raw.to_string();
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let outcome = match record.latest_version.as_deref() {
                Some(latest) if latest != record.imported_version => {
                    match Self::apply(&text, record, latest) {
                        Ok((rewritten, occurrences, new_url)) => {
                            text = rewritten;
                            RewriteOutcome::Applied {
                                from: record.import_url.clone(),
                                to: new_url,
                                occurrences,
                            }
                        }
                        Err(reason) => RewriteOutcome::Mismatch(reason),
                    }
                }
                _ => RewriteOutcome::Skipped,
            };

            entries.push(RewriteEntry {
                name: record.name.clone(),
                import_url: record.import_url.clone(),
                outcome,
            });
        }

        RewriteResult { text, entries }
    }

    /// Construct anchor, locate, replace, verify.
    fn apply(
        text: &str,
        record: &ModuleRecord,
        latest: &str,
    ) -> Result<(String, usize, String), String> {
        let new_url = Self::rewrite_url(record, latest)?;
        let anchor = record.import_url.as_str();

        let positions = Self::quoted_occurrences(text, anchor);
        if positions.is_empty() {
            return Err(format!("import URL '{}' not found in manifest", anchor));
        }

        let mut rewritten = String::with_capacity(text.len() + positions.len() * new_url.len());
        let mut cursor = 0;
        for &start in &positions {
            rewritten.push_str(&text[cursor..start]);
            rewritten.push_str(&new_url);
            cursor = start + anchor.len();
        }
        rewritten.push_str(&text[cursor..]);

        if !Self::quoted_occurrences(&rewritten, anchor).is_empty() {
            return Err(format!(
                "import URL '{}' still present after replacement",
                anchor
            ));
        }

        Ok((rewritten, positions.len(), new_url))
    }

    /// Swap the fragment at its expected position right after the path marker.
    fn rewrite_url(record: &ModuleRecord, latest: &str) -> Result<String, String> {
        let fragment = Fragment::for_record(record, latest);
        let url = record.import_url.as_str();

        let start = if record.is_standard_library() {
            url.find(STD_MARKER).map(|i| i + 1)
        } else {
            url.find(REGISTRY_MARKER).map(|i| i + REGISTRY_MARKER.len())
        };

        match start {
            Some(start) if url[start..].starts_with(&fragment.old) => Ok(format!(
                "{}{}{}",
                &url[..start],
                fragment.new,
                &url[start + fragment.old.len()..]
            )),
            _ => Err(format!(
                "fragment '{}' not found in import URL '{}'",
                fragment.old, url
            )),
        }
    }

    /// Byte offsets of `anchor` where it is wrapped in matching quotes.
    fn quoted_occurrences(text: &str, anchor: &str) -> Vec<usize> {
        text.match_indices(anchor)
            .filter(|(start, _)| {
                let before = text[..*start].chars().next_back();
                let after = text[start + anchor.len()..].chars().next();
                matches!((before, after), (Some(b), Some(a)) if b == a && QUOTES.contains(&b))
            })
            .map(|(start, _)| start)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::manifest_parser::ManifestParser;
    use crate::agents::module_record::ModuleKind;

    fn resolve(records: &[ModuleRecord], latest: &[(&str, &str)]) -> Vec<ModuleRecord> {
        records
            .iter()
            .map(|record| {
                let version = latest
                    .iter()
                    .find(|(name, _)| *name == record.name)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| record.imported_version.clone());
                record.with_resolution(None, version)
            })
            .collect()
    }

    fn parse(text: &str) -> Vec<ModuleRecord> {
        ManifestParser::new().unwrap().parse(text, &[]).records
    }

    #[test]
    fn updates_std_module_version() {
        let text = "export { fs } from \"https://deno.land/std@0.50.0/fs/mod.ts\";\n";
        let records = resolve(&parse(text), &[("fs", "0.60.0")]);

        let result = ManifestRewriter::rewrite(text, &records);

        assert_eq!(
            result.text,
            "export { fs } from \"https://deno.land/std@0.60.0/fs/mod.ts\";\n"
        );
        assert_eq!(result.applied_count(), 1);
    }

    #[test]
    fn shared_version_only_changes_the_updated_module() {
        let text = r#"import { a } from "https://deno.land/x/alpha@1.0.0/mod.ts";
import { b } from "https://deno.land/x/beta@1.0.0/mod.ts";
"#;
        let records = resolve(&parse(text), &[("alpha", "2.0.0")]);

        let result = ManifestRewriter::rewrite(text, &records);

        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(
            lines[0],
            r#"import { a } from "https://deno.land/x/alpha@2.0.0/mod.ts";"#
        );
        assert_eq!(
            lines[1],
            r#"import { b } from "https://deno.land/x/beta@1.0.0/mod.ts";"#
        );
        assert_eq!(result.entries[1].outcome, RewriteOutcome::Skipped);
    }

    #[test]
    fn untouched_lines_are_byte_identical() {
        let text = "// keep   this  \r\nimport { a } from 'https://deno.land/x/alpha@1.0.0/mod.ts';\r\n\r\nconst x = \"https://deno.land/x/alpha@1.0.0/mod.ts is cached\";\r\n";
        let records = resolve(&parse(text), &[("alpha", "1.1.0")]);

        let result = ManifestRewriter::rewrite(text, &records);

        assert_eq!(
            result.text,
            "// keep   this  \r\nimport { a } from 'https://deno.land/x/alpha@1.1.0/mod.ts';\r\n\r\nconst x = \"https://deno.land/x/alpha@1.0.0/mod.ts is cached\";\r\n"
        );
    }

    #[test]
    fn repeated_import_url_is_rewritten_everywhere() {
        let text = r#"import { a } from "https://deno.land/x/alpha@1.0.0/mod.ts";
export { a } from "https://deno.land/x/alpha@1.0.0/mod.ts";
"#;
        let records = resolve(&parse(text), &[("alpha", "1.2.0")]);

        let result = ManifestRewriter::rewrite(text, &records);

        assert!(!result.text.contains("alpha@1.0.0"));
        assert!(matches!(
            result.entries[0].outcome,
            RewriteOutcome::Applied { occurrences: 2, .. }
        ));
    }

    #[test]
    fn name_suffix_collision_is_not_rewritten() {
        let text = r#"import { a } from "https://deno.land/x/a@1.0.0/mod.ts";
import { d } from "https://deno.land/x/data@1.0.0/mod.ts";
"#;
        let records = resolve(&parse(text), &[("a", "3.0.0")]);

        let result = ManifestRewriter::rewrite(text, &records);

        assert!(result.text.contains("/x/a@3.0.0/mod.ts"));
        assert!(result.text.contains("/x/data@1.0.0/mod.ts"));
    }

    #[test]
    fn missing_anchor_is_a_mismatch() {
        let record = ModuleRecord::new(
            "alpha",
            ModuleKind::ThirdParty,
            "1.0.0",
            "https://deno.land/x/alpha@1.0.0/mod.ts",
        )
        .unwrap()
        .with_resolution(None, "2.0.0".to_string());
        let text = "import { a } from \"https://deno.land/x/alpha@1.5.0/mod.ts\";\n";

        let result = ManifestRewriter::rewrite(text, &[record]);

        assert_eq!(result.text, text);
        assert!(!result.is_changed());
        assert_eq!(result.mismatches().count(), 1);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let text = r#"export * from "https://deno.land/std@0.50.0/fs/mod.ts";
export * from "https://deno.land/x/alpha@v1.0.0/mod.ts";
export * from "https://deno.land/x/beta@v1.0.0/mod.ts";
"#;
        let latest = [("fs", "0.60.0"), ("alpha", "v2.0.0"), ("beta", "v1.0.0")];

        let first = ManifestRewriter::rewrite(text, &resolve(&parse(text), &latest));
        let second = ManifestRewriter::rewrite(&first.text, &resolve(&parse(&first.text), &latest));

        assert_eq!(first.applied_count(), 2);
        assert_eq!(second.text, first.text);
        assert!(!second.is_changed());
        assert!(resolve(&parse(&second.text), &latest)
            .iter()
            .all(|r| !r.is_outdated()));
    }

    #[test]
    fn anchors_of_distinct_modules_do_not_overlap() {
        let text = r#"import { a } from "https://deno.land/x/a@1.0.0/mod.ts";
import { d } from "https://deno.land/x/data@1.0.0/mod.ts";
import { f } from "https://deno.land/std@1.0.0/fs/mod.ts";
import { p } from "https://deno.land/std@1.0.0/path/mod.ts";
"#;
        let records = parse(text);
        let lines: Vec<&str> = text.lines().collect();

        for (i, record) in records.iter().enumerate() {
            for (j, other) in records.iter().enumerate() {
                if record.name != other.name {
                    let quoted = format!("\"{}\"", record.import_url);
                    assert!(!lines[j].contains(&quoted), "{} leaks into line {}", record.name, i);
                }
            }
        }
    }

    #[test]
    fn builds_std_and_registry_fragments() {
        let fs = ModuleRecord::new(
            "fs",
            ModuleKind::StandardLibrary,
            "0.50.0",
            "https://deno.land/std@0.50.0/fs/mod.ts",
        )
        .unwrap();
        assert_eq!(
            Fragment::for_record(&fs, "0.60.0"),
            Fragment {
                old: "std@0.50.0/fs".to_string(),
                new: "std@0.60.0/fs".to_string(),
            }
        );
    }
}
