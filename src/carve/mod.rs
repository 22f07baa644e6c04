//! File carving - recover embedded files from a raw image by header/footer
//! signatures.
//!
//! # Design
//!
//! - **One worker per file type**: every catalog group gets its own matcher
//!   set and its own read handle; workers run on a dedicated rayon pool and
//!   never share mutable state
//! - **Single merge point**: each worker sends its match list exactly once
//!   over a crossbeam channel, drained after the pool scope joins
//! - **Isolated failures**: a file type that fails to scan is reported as
//!   [`TypeStatus::Failed`]; its siblings carry on
//! - **Pairing then extraction**: matches are paired per [`Pairing`]
//!   strategy and each pair is copied verbatim, footer included, into
//!   `output_dir/<file_type>/`

pub mod extract;
pub mod pairing;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, FileTypeGroup};
use crate::engine::{build_matchers, sort_matches, EngineKind, Match, Matcher, Tag, DEFAULT_BUFFER_SIZE};
use crate::error::Result;

pub use pairing::{Pair, Pairing};

/// File name of the serialized report written next to the carved files
pub const MANIFEST_FILE: &str = "manifest.json";

/// Options for a carve operation
#[derive(Debug, Clone)]
pub struct CarveOptions {
    /// Image to carve from (opened read-only)
    pub source: PathBuf,
    /// Root of the per-type output directories
    pub output_dir: PathBuf,
    pub engine: EngineKind,
    /// Read size for the matchers
    pub buffer_size: usize,
    /// Only carve these file types (None = whole catalog)
    pub file_types: Option<Vec<String>>,
    /// Scan threads; 0 = one per file type
    pub workers: usize,
    pub pairing: Pairing,
    /// Pair and hash, but write nothing
    pub dry_run: bool,
    /// Write `manifest.json` into the output directory
    pub write_manifest: bool,
}

impl Default for CarveOptions {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            output_dir: PathBuf::from("carved"),
            engine: EngineKind::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            file_types: None,
            workers: 0,
            pairing: Pairing::default(),
            dry_run: false,
            write_manifest: false,
        }
    }
}

/// One extracted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarvedFile {
    /// Pair index within its file type
    pub index: usize,
    /// Where the file was written (None on a dry run)
    pub path: Option<PathBuf>,
    /// First byte in the source
    pub start: u64,
    /// One past the last byte in the source
    pub end: u64,
    pub size: u64,
    /// Blake3 hex digest of the content
    pub blake3: String,
}

/// Outcome of one file type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TypeStatus {
    /// Scan finished, no signature found
    #[default]
    NoMatches,
    /// Signatures found but no pair could be extracted
    Unpaired,
    /// At least one pair was extracted (or attempted)
    Carved,
    /// The scan itself failed
    Failed { error: String },
}

/// Per-type summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeReport {
    pub status: TypeStatus,
    pub headers: usize,
    pub footers: usize,
    pub pairs: usize,
    /// Pairs with no length or over the type's size limit
    pub pairs_skipped: usize,
    pub files_failed: usize,
    pub files: Vec<CarvedFile>,
    pub errors: Vec<String>,
}

impl TypeReport {
    fn failed(error: String) -> Self {
        Self {
            status: TypeStatus::Failed { error },
            ..Default::default()
        }
    }

    pub fn bytes_carved(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Result of a carve operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarveReport {
    pub source: PathBuf,
    pub started_at: DateTime<Utc>,
    pub image_size: u64,
    pub engine: EngineKind,
    pub pairing: Pairing,
    pub dry_run: bool,
    pub duration_ms: u64,
    pub types: BTreeMap<String, TypeReport>,
}

impl CarveReport {
    pub fn files_carved(&self) -> usize {
        self.types.values().map(|t| t.files.len()).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.types.values().map(|t| t.files_failed).sum()
    }

    pub fn bytes_carved(&self) -> u64 {
        self.types.values().map(TypeReport::bytes_carved).sum()
    }

    /// File types whose scan failed
    pub fn failed_types(&self) -> Vec<&str> {
        self.types
            .iter()
            .filter(|(_, t)| matches!(t.status, TypeStatus::Failed { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Serialize the report to `dir/manifest.json`
    pub fn write_manifest(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(path)
    }
}

/// Matches of one file type from a scan-only run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeMatches {
    pub matches: Vec<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a scan-only run
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub source: PathBuf,
    pub image_size: u64,
    pub engine: EngineKind,
    pub duration_ms: u64,
    pub types: BTreeMap<String, TypeMatches>,
}

impl ScanReport {
    pub fn total_matches(&self) -> usize {
        self.types.values().map(|t| t.matches.len()).sum()
    }
}

/// Progress updates emitted during a run. Sent from worker threads.
#[derive(Debug, Clone)]
pub enum CarveProgress {
    /// Workers started, one per file type
    Scanning { file_types: usize },
    /// One file type finished scanning
    Scanned { file_type: String, matches: usize },
    /// Extracting pair `current` of `total` for a file type
    Extracting {
        file_type: String,
        current: usize,
        total: usize,
    },
    Done,
}

/// The carving orchestrator
pub struct Carver {
    options: CarveOptions,
    groups: BTreeMap<String, FileTypeGroup>,
    matchers: BTreeMap<String, Vec<Box<dyn Matcher>>>,
}

impl Carver {
    /// Build every matcher up front. Empty signatures, bad buffer sizes and
    /// unknown file types fail here, before the source is touched.
    pub fn new(catalog: &Catalog, options: CarveOptions) -> Result<Self> {
        let mut catalog = catalog.clone();
        if let Some(types) = &options.file_types {
            catalog.retain_types(types)?;
        }

        let groups = catalog.groups();
        let mut matchers = BTreeMap::new();
        for (name, group) in &groups {
            let built = build_matchers(options.engine, &group.patterns(), options.buffer_size)?;
            tracing::debug!(
                file_type = %name,
                engine = %options.engine,
                signatures = group.signatures.len(),
                matchers = built.len(),
                "Matchers built"
            );
            matchers.insert(name.clone(), built);
        }

        Ok(Self {
            options,
            groups,
            matchers,
        })
    }

    pub fn options(&self) -> &CarveOptions {
        &self.options
    }

    /// File-type groups this carver runs, by name
    pub fn groups(&self) -> &BTreeMap<String, FileTypeGroup> {
        &self.groups
    }

    /// Scan and report matches without pairing or extracting
    pub fn scan(&self) -> Result<ScanReport> {
        self.scan_with_progress(|_| {})
    }

    pub fn scan_with_progress<F>(&self, on_progress: F) -> Result<ScanReport>
    where
        F: Fn(CarveProgress) + Send + Sync,
    {
        let start = Instant::now();
        let image_size = self.image_size()?;
        let pool = self.pool()?;

        let types = self
            .scan_groups(&pool, &on_progress)
            .into_iter()
            .map(|(name, result)| {
                let entry = match result {
                    Ok(matches) => TypeMatches {
                        matches,
                        error: None,
                    },
                    Err(e) => {
                        tracing::error!(file_type = %name, error = %e, "Scan failed");
                        TypeMatches {
                            matches: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                };
                (name, entry)
            })
            .collect();

        on_progress(CarveProgress::Done);

        Ok(ScanReport {
            source: self.options.source.clone(),
            image_size,
            engine: self.options.engine,
            duration_ms: start.elapsed().as_millis() as u64,
            types,
        })
    }

    /// Convenience wrapper without progress (for tests and non-interactive use)
    pub fn carve(&self) -> Result<CarveReport> {
        self.carve_with_progress(|_| {})
    }

    /// Scan every file type, pair, and extract. The callback is invoked from
    /// worker threads.
    pub fn carve_with_progress<F>(&self, on_progress: F) -> Result<CarveReport>
    where
        F: Fn(CarveProgress) + Send + Sync,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let options = &self.options;
        let image_size = self.image_size()?;

        if image_size == 0 {
            tracing::warn!(source = %options.source.display(), "Source is empty");
        }

        tracing::info!(
            source = %options.source.display(),
            image_size,
            file_types = self.groups.len(),
            engine = %options.engine,
            pairing = %options.pairing,
            buffer_size = options.buffer_size,
            dry_run = options.dry_run,
            "Starting file carve"
        );

        if !options.dry_run {
            fs::create_dir_all(&options.output_dir)?;
        }

        let pool = self.pool()?;
        let results = self.scan_groups(&pool, &on_progress);

        let types: BTreeMap<String, TypeReport> = pool.install(|| {
            results
                .into_par_iter()
                .map(|(name, result)| {
                    let report = self.finish_type(&name, result, &on_progress);
                    (name, report)
                })
                .collect()
        });

        on_progress(CarveProgress::Done);

        let report = CarveReport {
            source: options.source.clone(),
            started_at,
            image_size,
            engine: options.engine,
            pairing: options.pairing,
            dry_run: options.dry_run,
            duration_ms: start.elapsed().as_millis() as u64,
            types,
        };

        tracing::info!(
            files_carved = report.files_carved(),
            files_failed = report.files_failed(),
            failed_types = report.failed_types().len(),
            bytes = report.bytes_carved(),
            duration_ms = report.duration_ms,
            "Carve complete"
        );

        if options.write_manifest && !options.dry_run {
            let path = report.write_manifest(&options.output_dir)?;
            tracing::info!(path = %path.display(), "Manifest written");
        }

        Ok(report)
    }

    fn image_size(&self) -> Result<u64> {
        Ok(File::open(&self.options.source)?.metadata()?.len())
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        let threads = match self.options.workers {
            0 => self.matchers.len().max(1),
            n => n,
        };
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sawmill-worker-{i}"))
            .build()?)
    }

    /// Fan out one task per file type, fan in over a channel
    fn scan_groups<F>(
        &self,
        pool: &rayon::ThreadPool,
        on_progress: &F,
    ) -> BTreeMap<String, Result<Vec<Match>>>
    where
        F: Fn(CarveProgress) + Send + Sync,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<(String, Result<Vec<Match>>)>();
        let source = self.options.source.as_path();

        on_progress(CarveProgress::Scanning {
            file_types: self.matchers.len(),
        });

        pool.scope(|scope| {
            for (name, matchers) in &self.matchers {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = scan_group(source, name, matchers);
                    if let Ok(matches) = &result {
                        on_progress(CarveProgress::Scanned {
                            file_type: name.clone(),
                            matches: matches.len(),
                        });
                    }
                    let _ = tx.send((name.clone(), result));
                });
            }
        });
        drop(tx);

        rx.iter().collect()
    }

    /// Pair and extract one file type's matches
    fn finish_type<F>(&self, name: &str, result: Result<Vec<Match>>, on_progress: &F) -> TypeReport
    where
        F: Fn(CarveProgress) + Send + Sync,
    {
        let matches = match result {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(file_type = %name, error = %e, "Scan failed");
                return TypeReport::failed(e.to_string());
            }
        };

        if matches.is_empty() {
            tracing::debug!(file_type = %name, "No signatures found");
            return TypeReport::default();
        }

        let options = &self.options;
        let group = self.groups.get(name);
        let max_size = group.and_then(|g| g.max_size);
        let extension = group.map_or(name, |g| g.extension.as_str());

        let pairs = pairing::pair(&matches, options.pairing);
        let mut report = TypeReport {
            status: TypeStatus::Unpaired,
            headers: matches.iter().filter(|m| m.tag == Tag::Header).count(),
            footers: matches.iter().filter(|m| m.tag == Tag::Footer).count(),
            pairs: pairs.len(),
            ..Default::default()
        };

        for (index, pair) in pairs.iter().enumerate() {
            on_progress(CarveProgress::Extracting {
                file_type: name.to_string(),
                current: index + 1,
                total: pairs.len(),
            });

            let Some(size) = pair.len() else {
                tracing::debug!(
                    file_type = %name,
                    header = pair.start(),
                    footer = pair.footer.offset,
                    "Footer ends before header, pair skipped"
                );
                report.pairs_skipped += 1;
                continue;
            };

            if let Some(max) = max_size.filter(|&max| size > max) {
                tracing::warn!(
                    file_type = %name,
                    start = pair.start(),
                    size,
                    max_size = max,
                    "Pair exceeds size limit, skipped"
                );
                report.pairs_skipped += 1;
                continue;
            }

            report.status = TypeStatus::Carved;
            let path = (!options.dry_run).then(|| {
                extract::output_path(&options.output_dir, name, index, pair.start(), extension)
            });
            let extracted = match &path {
                Some(dest) => extract::extract_to_file(&options.source, pair.start(), size, dest),
                None => extract::hash_range(&options.source, pair.start(), size),
            };

            match extracted {
                Ok(hash) => report.files.push(CarvedFile {
                    index,
                    path,
                    start: pair.start(),
                    end: pair.end(),
                    size,
                    blake3: hash.to_hex().to_string(),
                }),
                Err(e) => {
                    tracing::warn!(
                        file_type = %name,
                        start = pair.start(),
                        size,
                        error = %e,
                        "Failed to extract carved file"
                    );
                    report.files_failed += 1;
                    report
                        .errors
                        .push(format!("pair {index} at {:#x}: {e}", pair.start()));
                }
            }
        }

        tracing::info!(
            file_type = %name,
            headers = report.headers,
            footers = report.footers,
            pairs = report.pairs,
            carved = report.files.len(),
            skipped = report.pairs_skipped,
            failed = report.files_failed,
            "File type finished"
        );

        report
    }
}

/// Run every matcher of one group over its own read handle
fn scan_group(source: &Path, name: &str, matchers: &[Box<dyn Matcher>]) -> Result<Vec<Match>> {
    let started = Instant::now();
    let mut matches = Vec::new();
    for matcher in matchers {
        let mut file = File::open(source)?;
        matches.extend(matcher.scan(&mut file)?);
    }
    sort_matches(&mut matches);

    tracing::debug!(
        file_type = %name,
        matchers = matchers.len(),
        matches = matches.len(),
        scan_ms = started.elapsed().as_millis() as u64,
        "File type scanned"
    );

    Ok(matches)
}
