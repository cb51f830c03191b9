use crate::agents::module_record::ModuleRecord;
use crate::error::{DmmError, Result};
use crate::repository::ReleaseResolver;
use crate::utils::verbose;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::cmp::min;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const MAX_PARALLEL_REQUESTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub name: String,
    pub import_url: String,
    pub reason: String,
}

/// Records enriched by the resolver, plus the ones it could not answer for.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub resolved: Vec<ModuleRecord>,
    pub failures: Vec<ResolutionFailure>,
}

impl ResolutionReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Resolve every record in parallel. A failing record is reported and skipped;
/// it never blocks the others. Output keeps the input order.
pub fn resolve_all(records: &[ModuleRecord], resolver: &dyn ReleaseResolver) -> ResolutionReport {
    let mut report = ResolutionReport::default();
    if records.is_empty() {
        return report;
    }

    let pb = ProgressBar::new(records.len() as u64);
    if verbose::is_enabled() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let next = AtomicUsize::new(0);
    let workers = min(MAX_PARALLEL_REQUESTS, records.len());

    let outcomes: Vec<(usize, Result<ModuleRecord>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(record) = records.get(index) else {
                            break;
                        };
                        pb.set_message(format!("Checking {}", record.name));
                        local.push((index, resolve_isolated(record, resolver)));
                        pb.inc(1);
                    }
                    local
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });
    pb.finish_and_clear();

    let mut slots: Vec<Option<Result<ModuleRecord>>> = records.iter().map(|_| None).collect();
    for (index, outcome) in outcomes {
        slots[index] = Some(outcome);
    }

    for (record, slot) in records.iter().zip(slots) {
        let outcome = slot.unwrap_or_else(|| {
            Err(DmmError::resolution(&record.name, "resolution did not complete"))
        });
        match outcome {
            Ok(resolved) => report.resolved.push(resolved),
            Err(e) => {
                verbose::log(format!("Resolution failed for {}: {}", record.name, e));
                report.failures.push(ResolutionFailure {
                    name: record.name.clone(),
                    import_url: record.import_url.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// A panicking resolver fails only the record it was asked about.
fn resolve_isolated(
    record: &ModuleRecord,
    resolver: &dyn ReleaseResolver,
) -> Result<ModuleRecord> {
    panic::catch_unwind(AssertUnwindSafe(|| resolve_record(record, resolver))).unwrap_or_else(
        |payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DmmError::resolution(
                &record.name,
                format!("resolver panicked: {}", message),
            ))
        },
    )
}

fn resolve_record(record: &ModuleRecord, resolver: &dyn ReleaseResolver) -> Result<ModuleRecord> {
    let repository = resolver.resolve_repository(record)?;
    let with_repository = ModuleRecord {
        repository_url: Some(repository.clone()),
        ..record.clone()
    };
    let latest = resolver.resolve_latest_version(&with_repository)?;
    Ok(record.with_resolution(Some(repository), latest))
}
