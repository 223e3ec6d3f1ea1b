//! The slice pipeline: plan bands, build slices, keep the ones with new labels.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::detector::{LabelDetector, Verdict};
use crate::document::{SourceDocument, SourcePage};
use crate::error::{Error, Result};
use crate::extract::{PageTemplate, SliceDocument};
use crate::geometry::{slice_rects, CropRect};
use crate::label::LabelCode;
use crate::ledger::SeenLabels;
use crate::options::{ErrorMode, SliceOptions, Staging};

/// A planned candidate slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Candidate number over the whole document, starting at 1
    pub index: u32,
    /// Source page number (1-based)
    pub page: u32,
    /// Crop window relative to the page's lower-left corner
    pub rect: CropRect,
}

/// One accepted slice written to the output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Final file path
    pub path: PathBuf,
    /// Candidate number the file name is derived from
    pub index: u32,
    /// Source page number (1-based)
    pub page: u32,
    /// Crop window relative to the page's lower-left corner
    pub rect: CropRect,
    /// The new code that caused the slice to be kept
    pub label: LabelCode,
}

/// Why a candidate slice was not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// Every code on it was already accepted
    Duplicate,
    /// No code on it
    NoLabel,
    /// Its text layer could not be read
    Unreadable,
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceStats {
    /// Pages in the source document
    pub page_count: u32,
    /// Candidate slices planned
    pub candidates: u32,
    /// Slices kept
    pub accepted: u32,
    /// Slices whose codes were all seen before
    pub duplicates: u32,
    /// Slices without any code
    pub blank: u32,
    /// Slices whose text could not be read
    pub unreadable: u32,
    /// Slices that could not be built or staged
    pub failed: u32,
}

/// Result of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SliceReport {
    /// Accepted slices, in page then top-to-bottom order
    pub records: Vec<OutputRecord>,
    /// Run statistics
    pub stats: SliceStats,
}

impl SliceReport {
    /// Paths of the accepted slices, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.iter().map(|r| r.path.clone()).collect()
    }

    /// Serialize the report as JSON.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum SliceEvent {
    /// The source is open and every band is planned.
    Started { pages: usize, candidates: usize },
    /// A slice was kept.
    Accepted(OutputRecord),
    /// A slice was dropped.
    Rejected { band: Band, reason: Rejection },
    /// A slice could not be built; the run continues.
    Failed { band: Band, reason: String },
    /// The run completed.
    Finished(SliceStats),
}

/// Where a built slice currently lives.
enum Staged {
    /// Serialized PDF bytes, written out only if accepted
    Memory(Vec<u8>),
    File(PathBuf),
}

/// A candidate after building and scanning, waiting for its verdict.
enum Scanned {
    Ready {
        band: Band,
        staged: Staged,
        codes: Result<Vec<LabelCode>>,
    },
    Failed {
        band: Band,
        error: Error,
    },
}

/// Splits label sheets into one document per new label.
///
/// Holds no state between runs: every call to [`run`](Self::run) starts with
/// an empty ledger and candidate numbering at 1.
#[derive(Debug, Clone)]
pub struct SlicePipeline {
    options: SliceOptions,
    detector: LabelDetector,
}

impl SlicePipeline {
    /// Create a pipeline, validating the options.
    pub fn new(options: SliceOptions) -> Result<Self> {
        let pattern = options.validate()?;
        let detector = LabelDetector::new()
            .with_pattern(pattern)
            .with_scope(options.scope);
        Ok(Self { options, detector })
    }

    /// The options this pipeline runs with.
    pub fn options(&self) -> &SliceOptions {
        &self.options
    }

    /// The detector this pipeline decides with.
    pub fn detector(&self) -> &LabelDetector {
        &self.detector
    }

    /// Split `input` into `output_dir`.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output_dir: Q) -> Result<SliceReport> {
        self.run_with_observer(input, output_dir, |_| {})
    }

    /// Split `input` into `output_dir`, reporting progress to `observer`.
    pub fn run_with_observer<P, Q, F>(&self, input: P, output_dir: Q, mut observer: F) -> Result<SliceReport>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        F: FnMut(&SliceEvent),
    {
        let source = SourceDocument::open(input.as_ref())?;
        let dir = output_dir.as_ref();
        fs::create_dir_all(dir)?;
        self.process(&source, dir, &mut observer)
    }

    /// Split an already opened document into `output_dir`.
    pub fn run_document<Q: AsRef<Path>>(&self, source: &SourceDocument, output_dir: Q) -> Result<SliceReport> {
        let dir = output_dir.as_ref();
        fs::create_dir_all(dir)?;
        self.process(source, dir, &mut |_: &SliceEvent| {})
    }

    /// Every candidate band of `source`, numbered in processing order.
    pub fn plan(&self, source: &SourceDocument) -> Vec<Band> {
        self.plan_pages(source)
            .into_iter()
            .flat_map(|(_, bands)| bands)
            .collect()
    }

    /// The codes visible in every band, without deciding or writing anything.
    pub fn inspect(&self, source: &SourceDocument) -> Vec<(Band, Result<Vec<LabelCode>>)> {
        let mut survey = Vec::new();
        for (page, bands) in self.plan_pages(source) {
            let template = PageTemplate::new(source, &page);
            for band in bands {
                let codes = match &template {
                    Ok(template) => template
                        .slice(&band.rect)
                        .and_then(|slice| self.detector.scan(&slice)),
                    Err(e) => Err(Error::SliceExtraction {
                        page: band.page,
                        index: band.index,
                        reason: e.to_string(),
                    }),
                };
                survey.push((band, codes));
            }
        }
        survey
    }

    fn plan_pages(&self, source: &SourceDocument) -> Vec<(SourcePage, Vec<Band>)> {
        let mut next_index = 1u32;
        source
            .pages()
            .iter()
            .map(|page| {
                let bands = slice_rects(page.height, page.width, self.options.band_height)
                    .into_iter()
                    .map(|rect| {
                        let band = Band {
                            index: next_index,
                            page: page.number,
                            rect,
                        };
                        next_index += 1;
                        band
                    })
                    .collect();
                (*page, bands)
            })
            .collect()
    }

    fn process(
        &self,
        source: &SourceDocument,
        dir: &Path,
        observer: &mut dyn FnMut(&SliceEvent),
    ) -> Result<SliceReport> {
        let plan = self.plan_pages(source);
        let candidates: usize = plan.iter().map(|(_, bands)| bands.len()).sum();

        let mut report = SliceReport::default();
        report.stats.page_count = source.page_count() as u32;
        report.stats.candidates = candidates as u32;
        let mut seen = SeenLabels::new();

        log::info!(
            "Splitting {} page(s) into {} candidate slice(s) of {} pt",
            source.page_count(),
            candidates,
            self.options.band_height
        );
        observer(&SliceEvent::Started {
            pages: source.page_count(),
            candidates,
        });

        if self.options.parallel {
            // Build and scan a chunk of pages concurrently, then decide on that
            // chunk strictly in band order before starting the next one.
            let chunk = rayon::current_num_threads().max(1);
            for pages in plan.chunks(chunk) {
                let batches: Vec<Vec<Scanned>> = pages
                    .par_iter()
                    .map(|(page, bands)| self.scan_page(source, page, bands, dir))
                    .collect();

                let mut batches = batches.into_iter();
                while let Some(batch) = batches.next() {
                    if let Err(e) = self.settle_batch(batch, dir, &mut seen, &mut report, observer) {
                        batches.flatten().for_each(discard);
                        return Err(e);
                    }
                }
            }
        } else {
            for (page, bands) in &plan {
                let batch = self.scan_page(source, page, bands, dir);
                self.settle_batch(batch, dir, &mut seen, &mut report, observer)?;
            }
        }

        log::info!(
            "Kept {} of {} slice(s) ({} duplicate, {} blank, {} unreadable, {} failed)",
            report.stats.accepted,
            report.stats.candidates,
            report.stats.duplicates,
            report.stats.blank,
            report.stats.unreadable,
            report.stats.failed
        );
        observer(&SliceEvent::Finished(report.stats.clone()));

        Ok(report)
    }

    /// Build, stage and scan every band of one page.
    fn scan_page(
        &self,
        source: &SourceDocument,
        page: &SourcePage,
        bands: &[Band],
        dir: &Path,
    ) -> Vec<Scanned> {
        let template = PageTemplate::new(source, page);
        bands
            .iter()
            .map(|band| {
                let scanned = match &template {
                    Ok(template) => self.scan_band(template, band, dir),
                    Err(e) => Err(e.to_string()),
                };
                scanned.unwrap_or_else(|reason| Scanned::Failed {
                    band: *band,
                    error: Error::SliceExtraction {
                        page: band.page,
                        index: band.index,
                        reason,
                    },
                })
            })
            .collect()
    }

    /// Build and stage one band, then read its codes.
    ///
    /// Both staging modes serialize the slice here, so a slice that cannot be
    /// written out fails under the error mode instead of at finalize time.
    /// Errors are the reason the slice could not be built or staged; a slice
    /// that was staged but cannot be read back still yields `Ready`.
    fn scan_band(
        &self,
        template: &PageTemplate,
        band: &Band,
        dir: &Path,
    ) -> std::result::Result<Scanned, String> {
        log::debug!(
            "Slice {}: page {}, y {:.1}..{:.1}",
            band.index,
            band.page,
            band.rect.y,
            band.rect.top()
        );

        let mut slice = template.slice(&band.rect).map_err(|e| e.to_string())?;

        let (staged, codes) = match self.options.staging {
            Staging::InMemory => {
                let codes = self.detector.scan(&slice);
                let bytes = slice.to_bytes().map_err(|e| e.to_string())?;
                (Staged::Memory(bytes), codes)
            }
            Staging::TempFile => {
                let temp = dir.join(self.options.temp_name(band.index));
                slice.save(&temp).map_err(|e| e.to_string())?;
                drop(slice);

                let codes = SliceDocument::load(&temp).and_then(|s| self.detector.scan(&s));
                (Staged::File(temp), codes)
            }
        };

        Ok(Scanned::Ready {
            band: *band,
            staged,
            codes,
        })
    }

    fn settle_batch(
        &self,
        batch: Vec<Scanned>,
        dir: &Path,
        seen: &mut SeenLabels,
        report: &mut SliceReport,
        observer: &mut dyn FnMut(&SliceEvent),
    ) -> Result<()> {
        let mut items = batch.into_iter();
        while let Some(item) = items.next() {
            if let Err(e) = self.settle(item, dir, seen, report, observer) {
                items.for_each(discard);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Decide on one scanned band and finalize or discard it.
    fn settle(
        &self,
        item: Scanned,
        dir: &Path,
        seen: &mut SeenLabels,
        report: &mut SliceReport,
        observer: &mut dyn FnMut(&SliceEvent),
    ) -> Result<()> {
        let (band, staged, codes) = match item {
            Scanned::Ready {
                band,
                staged,
                codes,
            } => (band, staged, codes),
            Scanned::Failed { band, error } => {
                report.stats.failed += 1;
                return match self.options.error_mode {
                    ErrorMode::Strict => Err(error),
                    ErrorMode::Lenient => {
                        log::warn!("Skipping slice: {}", error);
                        observer(&SliceEvent::Failed {
                            band,
                            reason: error.to_string(),
                        });
                        Ok(())
                    }
                };
            }
        };

        let verdict = match codes {
            Ok(codes) => self.detector.decide(&codes, seen),
            Err(e) => {
                log::warn!("Slice {}: text unreadable, treating as blank: {}", band.index, e);
                discard_staged(staged);
                report.stats.unreadable += 1;
                observer(&SliceEvent::Rejected {
                    band,
                    reason: Rejection::Unreadable,
                });
                return Ok(());
            }
        };

        let reason = match verdict {
            Verdict::Accepted(label) => {
                let path = dir.join(self.options.output_name(band.index));
                finalize(staged, &path)?;
                log::info!("Saved: {} ({})", path.display(), label);

                let record = OutputRecord {
                    path,
                    index: band.index,
                    page: band.page,
                    rect: band.rect,
                    label,
                };
                report.stats.accepted += 1;
                observer(&SliceEvent::Accepted(record.clone()));
                report.records.push(record);
                return Ok(());
            }
            Verdict::Duplicate => {
                report.stats.duplicates += 1;
                Rejection::Duplicate
            }
            Verdict::NoLabel => {
                report.stats.blank += 1;
                Rejection::NoLabel
            }
        };

        discard_staged(staged);
        log::debug!("Slice {}: rejected ({:?})", band.index, reason);
        observer(&SliceEvent::Rejected { band, reason });
        Ok(())
    }
}

/// Move a kept slice to its final path, replacing any file already there.
fn finalize(staged: Staged, path: &Path) -> Result<()> {
    match staged {
        Staged::Memory(bytes) => {
            fs::write(path, bytes)?;
            Ok(())
        }
        Staged::File(temp) => {
            if path.exists() {
                fs::remove_file(path)?;
            }
            fs::rename(&temp, path)?;
            Ok(())
        }
    }
}

fn discard(item: Scanned) {
    if let Scanned::Ready { staged, .. } = item {
        discard_staged(staged);
    }
}

/// Drop a rejected slice. A temp file that cannot be removed is left behind.
fn discard_staged(staged: Staged) {
    if let Staged::File(temp) = staged {
        if let Err(e) = fs::remove_file(&temp) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Could not remove {}: {}", temp.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sheet, PageSpec};

    const A: &str = "*ST100R1TAAAA 0001*";
    const B: &str = "*ST200R2TBBBB 0002*";

    fn source(specs: &[PageSpec]) -> SourceDocument {
        SourceDocument::from_bytes(&sheet(specs)).unwrap()
    }

    fn pipeline(options: SliceOptions) -> SlicePipeline {
        SlicePipeline::new(options).unwrap()
    }

    #[test]
    fn test_plan_numbers_across_pages() {
        let source = source(&[PageSpec::new(288.0, 600.0), PageSpec::new(288.0, 150.0)]);
        let bands = pipeline(SliceOptions::default()).plan(&source);

        let numbered: Vec<(u32, u32)> = bands.iter().map(|b| (b.index, b.page)).collect();
        assert_eq!(numbered, vec![(1, 1), (2, 1), (3, 1), (4, 2)]);
    }

    #[test]
    fn test_run_document_keeps_new_labels_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(&[
            PageSpec::new(288.0, 600.0)
                .text(20.0, 500.0, A)
                .text(20.0, 300.0, A),
            PageSpec::new(288.0, 600.0).text(20.0, 500.0, B),
        ]);

        let report = pipeline(SliceOptions::default().sequential())
            .run_document(&source, dir.path())
            .unwrap();

        let indices: Vec<u32> = report.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 4]);
        assert_eq!(report.records[0].label, LabelCode::new(A));
        assert_eq!(report.records[1].label, LabelCode::new(B));
        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(report.stats.blank, 3);
    }

    #[test]
    fn test_inspect_reports_codes_per_band() {
        let source = source(&[PageSpec::new(288.0, 600.0)
            .text(20.0, 500.0, A)
            .text(20.0, 300.0, B)]);
        let survey = pipeline(SliceOptions::default()).inspect(&source);

        let codes: Vec<usize> = survey
            .iter()
            .map(|(_, codes)| codes.as_ref().unwrap().len())
            .collect();
        assert_eq!(codes, vec![1, 1, 0]);
    }

    #[test]
    fn test_report_json() {
        let report = SliceReport::default();
        let json = report.to_json(false).unwrap();
        assert!(json.contains("\"records\":[]"));
        assert!(json.contains("\"candidates\":0"));
    }

    #[test]
    fn test_in_memory_slices_are_serialized_when_staged() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(&[PageSpec::new(288.0, 600.0).text(20.0, 500.0, A)]);
        let pipeline = pipeline(SliceOptions::default());
        let band = pipeline.plan(&source)[0];
        let template = PageTemplate::new(&source, source.page(1).unwrap()).unwrap();

        let scanned = pipeline.scan_band(&template, &band, dir.path()).unwrap();
        let bytes = match scanned {
            Scanned::Ready {
                staged: Staged::Memory(bytes),
                codes,
                ..
            } => {
                assert_eq!(codes.unwrap(), vec![LabelCode::new(A)]);
                bytes
            }
            _ => panic!("expected an in-memory slice"),
        };

        let path = dir.path().join("kept.pdf");
        finalize(Staged::Memory(bytes.clone()), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(SliceDocument::load(&path).is_ok());
    }

    #[test]
    fn test_parallel_chunks_match_sequential() {
        let pages = rayon::current_num_threads() * 3 + 1;
        let codes: Vec<String> = (0..pages)
            .map(|i| format!("*ST{:03}R1TPAGE {:04}*", i % 7, i % 7))
            .collect();
        let specs: Vec<PageSpec> = codes
            .iter()
            .map(|code| PageSpec::new(288.0, 600.0).text(20.0, 300.0, code))
            .collect();
        let source = source(&specs);

        let dir = tempfile::tempdir().unwrap();
        let parallel = pipeline(SliceOptions::default())
            .run_document(&source, dir.path().join("par"))
            .unwrap();
        let sequential = pipeline(SliceOptions::default().sequential())
            .run_document(&source, dir.path().join("seq"))
            .unwrap();

        let kept: Vec<u32> = parallel.records.iter().map(|r| r.index).collect();
        let expected: Vec<u32> = sequential.records.iter().map(|r| r.index).collect();
        assert_eq!(kept, expected);
        assert_eq!(kept.len(), pages.min(7));
        assert_eq!(parallel.stats, sequential.stats);
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        assert!(SlicePipeline::new(SliceOptions::new().with_band_height(-1.0)).is_err());
    }
}
