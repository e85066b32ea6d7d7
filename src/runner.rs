use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::adapter::Adapter;
use crate::error::{MigrationError, Result};
use crate::reconcile::{Plan, ReconciliationEngine};
use crate::revision::{FileRevision, RevisionParser, VersionId};
use crate::store::{DEFAULT_TRACKING_TABLE, RevisionStore, validate_table_name};

/// Sidecar file in the revisions directory listing versions never to apply
pub const BAD_REVISIONS_FILE: &str = "bad_revisions.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    DryRun,
    Interactive,
    NonInteractive,
    /// Fail when revisions are pending, apply nothing
    Check,
}

impl Mode {
    /// Resolve a mode name; anything unrecognised falls back to a dry run.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "interactive" => Mode::Interactive,
            "non-interactive" | "noninteractive" => Mode::NonInteractive,
            "check" => Mode::Check,
            "dry-run" | "dryrun" => Mode::DryRun,
            other => {
                warn!("Unknown mode '{}', falling back to dry run", other);
                Mode::DryRun
            }
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub mode: Mode,
    pub from_version: VersionId,
    pub target_version: VersionId,
    pub reached_version: VersionId,
    pub applied: Vec<VersionId>,
    pub skipped: Vec<VersionId>,
}

impl MigrationReport {
    fn unchanged(mode: Mode, plan: &Plan) -> Self {
        Self {
            mode,
            from_version: plan.current_version,
            target_version: plan.target_version,
            reached_version: plan.current_version,
            applied: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Read the bad-revision list from `dir`, if there is one.
///
/// Blank lines, non-numeric lines and `0` are ignored.
pub fn load_bad_revisions(dir: &Path) -> Result<BTreeSet<VersionId>> {
    let path = dir.join(BAD_REVISIONS_FILE);
    if !path.is_file() {
        return Ok(BTreeSet::new());
    }

    let content = fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
    Ok(content
        .lines()
        .filter_map(|line| line.trim().parse::<VersionId>().ok())
        .filter(|version| *version != 0)
        .collect())
}

pub struct MigrationRunner {
    adapter: Box<dyn Adapter>,
    revisions_dir: PathBuf,
    parser: RevisionParser,
    tracking_table: String,
    bad_revisions: BTreeSet<VersionId>,
    assume_yes: bool,
}

impl MigrationRunner {
    pub fn new(
        adapter: Box<dyn Adapter>,
        revisions_dir: impl AsRef<Path>,
        parser: RevisionParser,
    ) -> Result<Self> {
        let requested = revisions_dir.as_ref();
        let revisions_dir = fs::canonicalize(requested)
            .ok()
            .filter(|dir| dir.is_dir() && fs::read_dir(dir).is_ok())
            .ok_or_else(|| {
                MigrationError::Config(format!(
                    "Either the revisions directory ({}) does not exist or is not a readable directory",
                    requested.display()
                ))
            })?;

        let bad_revisions = load_bad_revisions(&revisions_dir)?;
        if !bad_revisions.is_empty() {
            info!("Loaded {} bad revision(s) to skip: {:?}", bad_revisions.len(), bad_revisions);
        }

        Ok(Self {
            adapter,
            revisions_dir,
            parser,
            tracking_table: DEFAULT_TRACKING_TABLE.to_string(),
            bad_revisions,
            assume_yes: false,
        })
    }

    pub fn with_tracking_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        self.tracking_table = table;
        Ok(self)
    }

    /// Answer the interactive confirmation with "yes" without asking.
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    pub fn revisions_dir(&self) -> &Path {
        &self.revisions_dir
    }

    pub fn bad_revisions(&self) -> &BTreeSet<VersionId> {
        &self.bad_revisions
    }

    pub fn into_adapter(self) -> Box<dyn Adapter> {
        self.adapter
    }

    /// Verify applied revisions and work out what a run would apply.
    pub fn plan(&mut self, base_version: VersionId) -> Result<Plan> {
        let mut store = RevisionStore::new(self.adapter.as_mut(), &self.tracking_table);
        ReconciliationEngine::new(&self.revisions_dir, &self.parser).plan(&mut store, base_version)
    }

    /// Run against the process's stdin and stdout.
    pub fn run(&mut self, mode: Mode, base_version: VersionId) -> Result<MigrationReport> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with(mode, base_version, &mut stdin.lock(), &mut stdout.lock())
    }

    pub fn run_with(
        &mut self,
        mode: Mode,
        base_version: VersionId,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<MigrationReport> {
        let plan = self.plan(base_version)?;

        match mode {
            Mode::DryRun => self.run_dry(&plan, output),
            Mode::Interactive => self.run_interactive(&plan, input, output),
            Mode::NonInteractive => self.run_non_interactive(&plan),
            Mode::Check => self.run_check(&plan),
        }
    }

    fn run_dry(&self, plan: &Plan, output: &mut dyn Write) -> Result<MigrationReport> {
        let rule = "+".repeat(30);
        writeln!(output, "{rule}").map_err(output_error)?;
        writeln!(output, "Running in dry run mode, nothing will be applied").map_err(output_error)?;
        writeln!(output, "{rule}").map_err(output_error)?;
        writeln!(
            output,
            "DB will be migrated from version {} to {}",
            plan.current_version, plan.target_version
        )
        .map_err(output_error)?;

        for revision in &plan.revisions {
            write_revision(output, revision, self.bad_revisions.contains(&revision.version_id))
                .map_err(output_error)?;
        }
        output.flush().map_err(output_error)?;

        Ok(MigrationReport::unchanged(Mode::DryRun, plan))
    }

    fn run_interactive(
        &mut self,
        plan: &Plan,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<MigrationReport> {
        info!("Running in interactive mode");
        if plan.is_empty() {
            writeln!(output, "There are no revisions to apply.").map_err(output_error)?;
            return Ok(MigrationReport::unchanged(Mode::Interactive, plan));
        }

        writeln!(output, "The following revisions will be applied:").map_err(output_error)?;
        for revision in &plan.revisions {
            writeln!(output, "{}: {}", revision.version_id, revision.title).map_err(output_error)?;
        }

        let confirmed = if self.assume_yes {
            true
        } else {
            write!(output, "Do you want to apply these revisions (no)? [yes/no] ")
                .map_err(output_error)?;
            output.flush().map_err(output_error)?;

            let mut response = String::new();
            input
                .read_line(&mut response)
                .map_err(|e| MigrationError::io("<stdin>", e))?;
            response.trim().eq_ignore_ascii_case("yes")
        };

        if !confirmed {
            writeln!(output, "OK, Bye!").map_err(output_error)?;
            return Ok(MigrationReport::unchanged(Mode::Interactive, plan));
        }

        let mut report = self.run_non_interactive(plan)?;
        report.mode = Mode::Interactive;
        Ok(report)
    }

    fn run_non_interactive(&mut self, plan: &Plan) -> Result<MigrationReport> {
        info!("Starting migrations...");

        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        let mut reached = plan.current_version;

        for revision in &plan.revisions {
            let version = revision.version_id;
            if self.bad_revisions.contains(&version) {
                info!("Migrating from {} to {} (skipped)", reached, version);
                skipped.push(version);
                continue;
            }

            info!("Migrating from {} to {}: {}", reached, version, revision.title);
            let start = Instant::now();

            let sql = revision.sql()?;
            self.adapter.execute(sql).map_err(|e| {
                error!("Revision {} ({}) failed: {}", version, revision.file_name, e);
                match e {
                    MigrationError::Query(msg) => MigrationError::Query(format!(
                        "revision {} ({}): {}",
                        version, revision.file_name, msg
                    )),
                    other => other,
                }
            })?;

            RevisionStore::new(self.adapter.as_mut(), &self.tracking_table).record(revision)?;

            info!("Revision {} applied in {}ms", version, start.elapsed().as_millis());
            applied.push(version);
            reached = version;
        }

        info!("Successfully migrated DB to version: {}", reached);
        Ok(MigrationReport {
            mode: Mode::NonInteractive,
            from_version: plan.current_version,
            target_version: plan.target_version,
            reached_version: reached,
            applied,
            skipped,
        })
    }

    fn run_check(&self, plan: &Plan) -> Result<MigrationReport> {
        if !plan.is_empty() {
            return Err(MigrationError::Outdated {
                current: plan.current_version,
                target: plan.target_version,
                pending: plan.revisions.len(),
            });
        }

        info!("Schema is up to date (version {})", plan.current_version);
        Ok(MigrationReport::unchanged(Mode::Check, plan))
    }
}

fn write_revision(output: &mut dyn Write, revision: &FileRevision, bad: bool) -> io::Result<()> {
    writeln!(output, "Revision version: {}", revision.version_id)?;
    writeln!(output, "Description: {}", revision.title)?;
    writeln!(output, "File: {}", revision.file_name)?;
    if bad {
        writeln!(output, "Listed in {}, will be skipped", BAD_REVISIONS_FILE)?;
    }
    writeln!(output, "{}", "-".repeat(30))?;
    writeln!(output, "Content")?;
    writeln!(output, "{}", String::from_utf8_lossy(&revision.content))
}

fn output_error(e: io::Error) -> MigrationError {
    MigrationError::io("<stdout>", e)
}
