use dbvc::adapter::{ConnectionParams, SqliteAdapter};
use dbvc::revision::checksum::checksum_bytes;
use dbvc::runner::BAD_REVISIONS_FILE;
use dbvc::{MigrationError, MigrationRunner, Mode, RevisionParser};
use pretty_assertions::assert_eq;
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

const TRACKING_TABLE: &str = "dbvc__schema_version";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("revisions")).unwrap();
        Self { dir }
    }

    fn revisions(&self) -> std::path::PathBuf {
        self.dir.path().join("revisions")
    }

    fn db_path(&self) -> std::path::PathBuf {
        self.dir.path().join("test.db")
    }

    fn write(&self, name: &str, content: &str) {
        fs::write(self.revisions().join(name), content).unwrap();
    }

    fn runner(&self) -> MigrationRunner {
        let adapter = SqliteAdapter::connect(&ConnectionParams {
            database: self.db_path().to_string_lossy().to_string(),
            ..Default::default()
        })
        .unwrap();
        MigrationRunner::new(Box::new(adapter), self.revisions(), RevisionParser::new("sql").unwrap())
            .unwrap()
    }

    fn apply(&self) -> dbvc::Result<dbvc::MigrationReport> {
        self.runner()
            .run_with(Mode::NonInteractive, 0, &mut io::empty(), &mut io::sink())
    }

    fn tracked(&self) -> Vec<(i64, String)> {
        tracked_rows(&self.db_path())
    }
}

fn tracked_rows(db_path: &Path) -> Vec<(i64, String)> {
    let conn = Connection::open(db_path).unwrap();
    conn.prepare(&format!("SELECT version_id, file FROM {} ORDER BY version_id", TRACKING_TABLE))
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_fresh_database_migration() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.write("2_seed.sql", "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);\n");

    let report = fixture.apply().unwrap();
    assert_eq!(report.applied, vec![1, 2]);
    assert_eq!(report.from_version, 0);
    assert_eq!(report.target_version, 2);
    assert_eq!(report.reached_version, 2);

    assert_eq!(
        fixture.tracked(),
        vec![(1, "1_init.sql".to_string()), (2, "2_seed.sql".to_string())]
    );

    let conn = Connection::open(fixture.db_path()).unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_idempotent_migrations() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.write("2_seed.sql", "INSERT INTO t VALUES (1);");

    assert_eq!(fixture.apply().unwrap().applied.len(), 2);

    let plan = fixture.runner().plan(0).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.current_version, 2);

    let report = fixture.apply().unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(fixture.tracked().len(), 2);
}

#[test]
fn test_new_revisions_applied_incrementally() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.apply().unwrap();

    fixture.write("2_add_name.sql", "ALTER TABLE t ADD COLUMN name TEXT;");
    fixture.write("3_seed.sql", "INSERT INTO t (id, name) VALUES (1, 'a');");

    let report = fixture.apply().unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.applied, vec![2, 3]);
    assert_eq!(fixture.tracked().len(), 3);
}

#[test]
fn test_bad_revision_is_skipped() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.write("2_seed.sql", "INSERT INTO t VALUES (1);");
    fs::write(fixture.revisions().join(BAD_REVISIONS_FILE), "2\n").unwrap();
    assert!(fixture.runner().bad_revisions().contains(&2));

    let report = fixture.apply().unwrap();
    assert_eq!(report.applied, vec![1]);
    assert_eq!(report.skipped, vec![2]);
    assert_eq!(report.reached_version, 1);
    assert_eq!(fixture.tracked(), vec![(1, "1_init.sql".to_string())]);

    let conn = Connection::open(fixture.db_path()).unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_tampered_revision_fails_before_new_ones_are_considered() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.apply().unwrap();

    fixture.write("1_init.sql", "CREATE TABLE t(id INT, name TEXT);");
    // A duplicate pair that would also fail, but only after the applied check
    fixture.write("2_a.sql", "SELECT 1;");
    fixture.write("2_b.sql", "SELECT 2;");

    let err = fixture.apply().unwrap_err();
    assert!(matches!(err, MigrationError::ChecksumMismatch { version: 1, .. }));
    assert_eq!(fixture.tracked().len(), 1);
}

#[test]
fn test_deleted_revision_file() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.apply().unwrap();

    fs::remove_file(fixture.revisions().join("1_init.sql")).unwrap();

    let err = fixture.apply().unwrap_err();
    assert!(matches!(err, MigrationError::MissingRevisionFile { version: 1, .. }));
}

#[test]
fn test_line_ending_conversion_is_not_tampering() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);\nCREATE TABLE u(id INT);\n");
    fixture.apply().unwrap();

    fixture.write("1_init.sql", "CREATE TABLE t(id INT);\r\nCREATE TABLE u(id INT);\r\n");
    fixture.write("2_seed.sql", "INSERT INTO t VALUES (1);");

    let report = fixture.apply().unwrap();
    assert_eq!(report.applied, vec![2]);
}

#[test]
fn test_duplicate_versions_are_rejected() {
    let fixture = Fixture::new();
    fixture.write("5_a.sql", "CREATE TABLE a(id INT);");
    fixture.write("5_b.sql", "CREATE TABLE b(id INT);");

    let err = fixture.apply().unwrap_err();
    assert!(matches!(err, MigrationError::DuplicateVersion { version: 5, .. }));
    assert!(fixture.tracked().is_empty());
}

#[test]
fn test_gap_does_not_stop_the_run() {
    let fixture = Fixture::new();
    fixture.write("1_a.sql", "CREATE TABLE a(id INT);");
    fixture.write("2_b.sql", "CREATE TABLE b(id INT);");
    fixture.write("3_c.sql", "CREATE TABLE c(id INT);");
    fixture.apply().unwrap();

    fixture.write("7_g.sql", "CREATE TABLE g(id INT);");
    let plan = fixture.runner().plan(0).unwrap();
    assert_eq!(plan.gap.map(|g| (g.current, g.next)), Some((3, 7)));

    let report = fixture.apply().unwrap();
    assert_eq!(report.applied, vec![7]);
    assert_eq!(report.reached_version, 7);
}

#[test]
fn test_base_version_skips_existing_history() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");
    fixture.write("2_seed.sql", "INSERT INTO t VALUES (1);");
    fixture.write("3_more.sql", "CREATE TABLE more(id INT);");

    let conn = Connection::open(fixture.db_path()).unwrap();
    conn.execute_batch("CREATE TABLE t(id INT);").unwrap();
    drop(conn);

    let report = fixture
        .runner()
        .run_with(Mode::NonInteractive, 2, &mut io::empty(), &mut io::sink())
        .unwrap();
    assert_eq!(report.from_version, 2);
    assert_eq!(report.applied, vec![3]);
    assert_eq!(fixture.tracked(), vec![(3, "3_more.sql".to_string())]);

    // Once 3 is recorded the floor is no longer needed
    assert!(fixture.runner().plan(0).unwrap().is_empty());
}

#[test]
fn test_non_revision_files_are_ignored() {
    let fixture = Fixture::new();
    fixture.write("1_init.SQL", "CREATE TABLE t(id INT);");
    fixture.write("schema.sql", "-- full dump");
    fixture.write("notes.txt", "not sql");

    let report = fixture.apply().unwrap();
    assert_eq!(report.applied, vec![1]);
}

#[test]
fn test_custom_tracking_table() {
    let fixture = Fixture::new();
    fixture.write("1_init.sql", "CREATE TABLE t(id INT);");

    let mut runner = fixture.runner().with_tracking_table("schema_history").unwrap();
    runner
        .run_with(Mode::NonInteractive, 0, &mut io::empty(), &mut io::sink())
        .unwrap();

    let conn = Connection::open(fixture.db_path()).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_history", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_applied_non_utf8_revision_does_not_block_later_runs() {
    let fixture = Fixture::new();
    fixture.apply().unwrap();

    // Applied by an earlier install, Latin-1 encoded
    let latin1 = b"-- caf\xe9\nCREATE TABLE t(id INT);\n";
    fs::write(fixture.revisions().join("1_init.sql"), latin1).unwrap();
    let conn = Connection::open(fixture.db_path()).unwrap();
    conn.execute_batch("CREATE TABLE t(id INT);").unwrap();
    conn.execute(
        &format!("INSERT INTO {} (version_id, file, checksum) VALUES (1, '1_init.sql', ?1)", TRACKING_TABLE),
        [checksum_bytes(latin1)],
    )
    .unwrap();
    drop(conn);

    fixture.write("2_seed.sql", "INSERT INTO t VALUES (1);");
    let report = fixture.apply().unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.applied, vec![2]);

    // Converting the applied file to CRLF is not tampering either
    fs::write(
        fixture.revisions().join("1_init.sql"),
        b"-- caf\xe9\r\nCREATE TABLE t(id INT);\r\n",
    )
    .unwrap();
    assert!(fixture.runner().plan(0).unwrap().is_empty());
}
