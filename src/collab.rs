//! Collaborators around the pipeline: choosing the input, choosing a printer
//! and handing accepted slices to it.
//!
//! The pipeline itself never prints. Front ends pick implementations of these
//! traits and run [`print_all`] over the paths in a [`SliceReport`](crate::SliceReport).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default print command. `{printer}` and `{file}` are substituted per job.
pub const DEFAULT_PRINT_COMMAND: &str = "lp -d {printer} {file}";

/// Default time to wait for the print command before moving on.
pub const DEFAULT_PRINT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Chooses the document to split.
pub trait FileSelector {
    /// The chosen file, or `None` when the user cancelled.
    fn select_input_file(&mut self) -> Option<PathBuf>;
}

/// Chooses the printer accepted slices are sent to.
pub trait PrinterSelector {
    /// The chosen printer name, or `None` when the user cancelled.
    fn select_printer(&mut self) -> Option<String>;
}

/// Hands one file to a printer.
pub trait PrintDispatcher {
    /// Submit `path` to `printer`.
    fn dispatch(&self, path: &Path, printer: &str) -> Result<()>;
}

/// A selector that returns a fixed answer once.
///
/// Covers non-interactive front ends where the choice came from the command
/// line or the environment.
#[derive(Debug, Clone, Default)]
pub struct Preselected<T> {
    value: Option<T>,
}

impl<T> Preselected<T> {
    /// Answer with `value`.
    pub fn new(value: Option<T>) -> Self {
        Self { value }
    }
}

impl FileSelector for Preselected<PathBuf> {
    fn select_input_file(&mut self) -> Option<PathBuf> {
        self.value.take()
    }
}

impl PrinterSelector for Preselected<String> {
    fn select_printer(&mut self) -> Option<String> {
        self.value.take().filter(|name| !name.trim().is_empty())
    }
}

/// Result of submitting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOutcome {
    /// File that was submitted
    pub path: PathBuf,
    /// Failure reason, `None` when the job was handed off
    pub error: Option<String>,
}

impl PrintOutcome {
    /// Whether the job was handed off.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-file results of a print batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintReport {
    /// Printer the batch was sent to
    pub printer: String,
    /// One entry per file, in submission order
    pub outcomes: Vec<PrintOutcome>,
}

impl PrintReport {
    /// Number of files handed off.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Files that could not be submitted.
    pub fn failures(&self) -> impl Iterator<Item = &PrintOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    /// Whether every file was handed off.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PrintOutcome::is_ok)
    }
}

/// Submit every path to `printer`, in order.
///
/// A failed job is logged and recorded; the remaining files are still sent.
pub fn print_all<D, P>(dispatcher: &D, paths: &[P], printer: &str) -> PrintReport
where
    D: PrintDispatcher + ?Sized,
    P: AsRef<Path>,
{
    let outcomes = paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            log::info!("Printing {} to {}", path.display(), printer);
            let error = match dispatcher.dispatch(path, printer) {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("{}", e);
                    Some(e.to_string())
                }
            };
            PrintOutcome {
                path: path.to_path_buf(),
                error,
            }
        })
        .collect();

    PrintReport {
        printer: printer.to_string(),
        outcomes,
    }
}

/// Prints by running an external command per file.
///
/// The template is split on whitespace before substitution, so a file or
/// printer name containing spaces stays a single argument. A command still
/// running after the timeout is left to finish on its own and the job counts
/// as handed off.
#[derive(Debug, Clone)]
pub struct CommandPrinter {
    template: String,
    timeout: Duration,
}

impl CommandPrinter {
    /// A printer using [`DEFAULT_PRINT_COMMAND`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different command template.
    pub fn with_command(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Set how long to wait for each job.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Program and arguments for one job.
    pub fn command_line(&self, path: &Path, printer: &str) -> Vec<String> {
        let file = path.to_string_lossy();
        self.template
            .split_whitespace()
            .map(|token| token.replace("{printer}", printer).replace("{file}", &file))
            .collect()
    }
}

impl Default for CommandPrinter {
    fn default() -> Self {
        Self {
            template: DEFAULT_PRINT_COMMAND.to_string(),
            timeout: DEFAULT_PRINT_TIMEOUT,
        }
    }
}

impl PrintDispatcher for CommandPrinter {
    fn dispatch(&self, path: &Path, printer: &str) -> Result<()> {
        let failed = |reason: String| Error::PrintDispatch {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(failed("file does not exist".to_string()));
        }

        let argv = self.command_line(path, printer);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| failed("empty print command".to_string()))?;

        log::debug!("Running {:?}", argv);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failed(format!("{}: {}", program, e)))?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(failed(format!("{} exited with {}", program, status))),
                Ok(None) if started.elapsed() >= self.timeout => {
                    log::warn!(
                        "{} still running after {:?}, not waiting for it",
                        program,
                        self.timeout
                    );
                    return Ok(());
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(failed(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every job and fails the ones whose name contains "bad".
    #[derive(Default)]
    struct MockPrinter {
        jobs: RefCell<Vec<(PathBuf, String)>>,
    }

    impl PrintDispatcher for MockPrinter {
        fn dispatch(&self, path: &Path, printer: &str) -> Result<()> {
            self.jobs
                .borrow_mut()
                .push((path.to_path_buf(), printer.to_string()));
            if path.to_string_lossy().contains("bad") {
                return Err(Error::PrintDispatch {
                    path: path.to_path_buf(),
                    reason: "paper jam".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_print_all_continues_after_failure() {
        let printer = MockPrinter::default();
        let paths = ["a.pdf", "bad.pdf", "c.pdf"];

        let report = print_all(&printer, &paths[..], "Zebra");

        assert_eq!(printer.jobs.borrow().len(), 3);
        assert!(printer.jobs.borrow().iter().all(|(_, p)| p == "Zebra"));
        assert_eq!(report.printer, "Zebra");
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_success());

        let failed: Vec<&PathBuf> = report.failures().map(|o| &o.path).collect();
        assert_eq!(failed, vec![&PathBuf::from("bad.pdf")]);
        assert!(report.outcomes[1].error.as_deref().unwrap().contains("paper jam"));
    }

    #[test]
    fn test_print_all_empty() {
        let report = print_all(&MockPrinter::default(), &[] as &[PathBuf], "Zebra");
        assert!(report.outcomes.is_empty());
        assert!(report.is_success());
    }

    #[test]
    fn test_preselected() {
        let mut files = Preselected::new(Some(PathBuf::from("sheet.pdf")));
        assert_eq!(files.select_input_file(), Some(PathBuf::from("sheet.pdf")));
        assert_eq!(files.select_input_file(), None);

        let mut printers = Preselected::new(Some("  ".to_string()));
        assert_eq!(printers.select_printer(), None);

        let mut printers = Preselected::new(Some("Zebra".to_string()));
        assert_eq!(printers.select_printer().as_deref(), Some("Zebra"));
    }

    #[test]
    fn test_command_line_substitution() {
        let printer = CommandPrinter::new();
        let argv = printer.command_line(Path::new("/tmp/My Labels/TextLabel_Part_1.pdf"), "Label Printer");
        assert_eq!(
            argv,
            vec!["lp", "-d", "Label Printer", "/tmp/My Labels/TextLabel_Part_1.pdf"]
        );
    }

    #[test]
    fn test_missing_file_is_not_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let result = CommandPrinter::new().dispatch(&dir.path().join("missing.pdf"), "Zebra");
        assert!(matches!(result, Err(Error::PrintDispatch { .. })));
    }

    #[test]
    fn test_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("label.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let result = CommandPrinter::new().with_command("   ").dispatch(&file, "Zebra");
        assert!(matches!(result, Err(Error::PrintDispatch { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("label.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        assert!(CommandPrinter::new()
            .with_command("true {printer} {file}")
            .dispatch(&file, "Zebra")
            .is_ok());
        assert!(CommandPrinter::new()
            .with_command("false {file}")
            .dispatch(&file, "Zebra")
            .is_err());
        assert!(CommandPrinter::new()
            .with_command("no-such-print-command-xyz {file}")
            .dispatch(&file, "Zebra")
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_command_times_out_as_handed_off() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("label.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let started = Instant::now();
        let result = CommandPrinter::new()
            .with_command("sleep 2")
            .with_timeout(Duration::from_millis(200))
            .dispatch(&file, "Zebra");
        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
