//! Integration tests for the sqlmig-sqlite crate.

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use sqlmig_core::MigrateConfig;
use sqlmig_sqlite::{Ledger, MigrateError, Migrator};
use tempfile::TempDir;

const MEDIA_SQL: &str = "CREATE TABLE media (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    alt TEXT NOT NULL DEFAULT '',
    type TEXT NOT NULL DEFAULT 'image',
    width INTEGER,
    height INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Creates a bootstrapped migrator over an in-memory database.
fn setup() -> (TempDir, Migrator) {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    let migrator = Migrator::new(conn, dir.path().join("migrations"), "_migrations").unwrap();
    migrator.bootstrap().unwrap();
    (dir, migrator)
}

fn write_script(migrator: &Migrator, name: &str, sql: &str) {
    fs::write(migrator.scripts_dir().join(name), sql).unwrap();
}

fn applied(migrator: &Migrator) -> Vec<String> {
    migrator
        .ledger()
        .list_applied_filenames(migrator.connection())
        .unwrap()
        .into_iter()
        .collect()
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})")).unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

// ---------------------------------------------------------------------------
// apply_pending
// ---------------------------------------------------------------------------

#[test]
fn apply_pending_is_idempotent() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_media.sql", MEDIA_SQL);

    let first = m.apply_pending().unwrap();
    assert_eq!(first.applied, ["001_media.sql"]);
    let records_before = m.ledger().records(m.connection()).unwrap();

    let second = m.apply_pending().unwrap();
    assert!(second.is_empty());
    assert_eq!(m.ledger().records(m.connection()).unwrap(), records_before);
}

#[test]
fn apply_pending_runs_in_filename_order() {
    let (_dir, mut m) = setup();
    // Each script depends on the previous one, so any other order fails.
    write_script(&m, "001_a.sql", "CREATE TABLE a (id INTEGER);");
    write_script(&m, "003_c.sql", "ALTER TABLE a ADD COLUMN c TEXT;");
    write_script(&m, "002_b.sql", "ALTER TABLE a ADD COLUMN b TEXT;");

    let report = m.apply_pending().unwrap();
    assert_eq!(report.applied, ["001_a.sql", "002_b.sql", "003_c.sql"]);
    assert_eq!(column_names(m.connection(), "a"), ["id", "b", "c"]);

    let order: Vec<_> = m
        .ledger()
        .records(m.connection())
        .unwrap()
        .into_iter()
        .map(|r| r.filename)
        .collect();
    assert_eq!(order, ["001_a.sql", "002_b.sql", "003_c.sql"]);
}

#[test]
fn apply_pending_halts_on_failure_and_rolls_back() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_ok.sql", "CREATE TABLE ok (id INTEGER);");
    write_script(
        &m,
        "002_bad.sql",
        "CREATE TABLE partial (id INTEGER); CREATE TABLE broken (;",
    );
    write_script(&m, "003_later.sql", "CREATE TABLE later (id INTEGER);");

    let err = m.apply_pending().unwrap_err();
    match err {
        MigrateError::MigrationExecutionError { filename, .. } => {
            assert_eq!(filename, "002_bad.sql")
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(applied(&m), ["001_ok.sql"]);
    assert!(table_exists(m.connection(), "ok"));
    assert!(!table_exists(m.connection(), "partial"));
    assert!(!table_exists(m.connection(), "later"));
}

#[test]
fn apply_pending_resumes_after_fix() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_ok.sql", "CREATE TABLE ok (id INTEGER);");
    write_script(&m, "002_bad.sql", "CREATE TABLE broken (;");
    assert!(m.apply_pending().is_err());

    write_script(&m, "002_bad.sql", "CREATE TABLE fixed (id INTEGER);");
    let report = m.apply_pending().unwrap();
    assert_eq!(report.applied, ["002_bad.sql"]);
    assert!(table_exists(m.connection(), "fixed"));
}

#[test]
fn apply_pending_records_sql_verbatim() {
    let (_dir, mut m) = setup();
    let sql = "-- media table\n".to_string() + MEDIA_SQL + "\n";
    write_script(&m, "001_media.sql", &sql);
    m.apply_pending().unwrap();

    let records = m.ledger().records(m.connection()).unwrap();
    assert_eq!(records[0].sql, sql);
}

#[test]
fn apply_pending_ignores_non_sql_files() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_a.sql", "CREATE TABLE a (id INTEGER);");
    write_script(&m, "notes.txt", "not sql at all");
    let report = m.apply_pending().unwrap();
    assert_eq!(report.applied, ["001_a.sql"]);
}

#[test]
fn apply_pending_on_missing_dir_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    let mut m = Migrator::new(conn, dir.path().join("absent"), "_migrations").unwrap();
    Ledger::new("_migrations")
        .unwrap()
        .ensure_schema(m.connection())
        .unwrap();
    assert!(matches!(
        m.apply_pending(),
        Err(MigrateError::IoError { .. })
    ));
}

// ---------------------------------------------------------------------------
// create_and_apply
// ---------------------------------------------------------------------------

#[test]
fn create_and_apply_starts_at_001() {
    let (_dir, mut m) = setup();
    let filename = m.create_and_apply("init", MEDIA_SQL).unwrap();
    assert_eq!(filename, "001_init.sql");
    assert!(table_exists(m.connection(), "media"));
}

#[test]
fn create_and_apply_follows_latest_record() {
    let (_dir, mut m) = setup();
    m.ledger()
        .record_applied(m.connection(), "007_x.sql", "SELECT 1;")
        .unwrap();
    let filename = m
        .create_and_apply("add_media", MEDIA_SQL)
        .unwrap();
    assert_eq!(filename, "008_add_media.sql");
}

#[test]
fn create_and_apply_round_trips_file_and_ledger() {
    let (_dir, mut m) = setup();
    let sql = "CREATE TABLE t (id INTEGER);\n\n-- trailing comment\n";
    let filename = m.create_and_apply("round_trip", sql).unwrap();

    let on_disk = fs::read(m.scripts_dir().join(&filename)).unwrap();
    assert_eq!(on_disk, sql.as_bytes());
    assert!(applied(&m).contains(&filename));

    // A later apply_pending sees nothing new.
    assert!(m.apply_pending().unwrap().is_empty());
}

#[test]
fn create_and_apply_skips_past_unapplied_higher_file() {
    let (_dir, mut m) = setup();
    m.create_and_apply("first", "CREATE TABLE a (id INTEGER);")
        .unwrap();
    write_script(&m, "004_manual.sql", "CREATE TABLE manual (id INTEGER);");

    let filename = m
        .create_and_apply("next", "CREATE TABLE b (id INTEGER);")
        .unwrap();
    assert_eq!(filename, "005_next.sql");
}

#[test]
fn create_and_apply_failure_leaves_no_trace() {
    let (_dir, mut m) = setup();
    let err = m.create_and_apply("bad", "CREATE TABLE (;").unwrap_err();
    assert!(matches!(err, MigrateError::MigrationExecutionError { .. }));

    assert!(applied(&m).is_empty());
    let entries: Vec<_> = fs::read_dir(m.scripts_dir()).unwrap().collect();
    assert!(entries.is_empty());
}

#[test]
fn create_and_apply_rejects_invalid_name() {
    let (_dir, mut m) = setup();
    let err = m.create_and_apply("../evil", "SELECT 1;").unwrap_err();
    assert!(matches!(err, MigrateError::CoreError(_)));
    assert!(applied(&m).is_empty());
}

#[test]
fn create_and_apply_rejects_exhausted_sequence() {
    let (_dir, mut m) = setup();
    m.ledger()
        .record_applied(m.connection(), "999_last.sql", "SELECT 1;")
        .unwrap();
    let err = m.create_and_apply("overflow", "SELECT 1;").unwrap_err();
    assert!(matches!(err, MigrateError::CoreError(_)));
}

#[test]
fn create_and_apply_rejects_script_that_commits() {
    let (_dir, mut m) = setup();
    let err = m
        .create_and_apply("sneaky", "CREATE TABLE t (id INTEGER); COMMIT;")
        .unwrap_err();
    match err {
        MigrateError::MigrationExecutionError { filename, .. } => {
            assert_eq!(filename, "001_sneaky.sql")
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(applied(&m).is_empty());
    assert!(!table_exists(m.connection(), "t"));
    assert_eq!(fs::read_dir(m.scripts_dir()).unwrap().count(), 0);
}

#[test]
fn apply_pending_rejects_transaction_control_without_partial_change() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_ok.sql", "CREATE TABLE ok (id INTEGER);");
    write_script(
        &m,
        "002_half.sql",
        "CREATE TABLE half (id INTEGER); COMMIT; CREATE TABLE (;",
    );
    write_script(&m, "003_rollback.sql", "CREATE TABLE gone (id INTEGER); ROLLBACK;");

    let err = m.apply_pending().unwrap_err();
    assert!(matches!(
        err,
        MigrateError::MigrationExecutionError { ref filename, .. } if filename == "002_half.sql"
    ));
    assert_eq!(applied(&m), ["001_ok.sql"]);
    assert!(table_exists(m.connection(), "ok"));
    assert!(!table_exists(m.connection(), "half"));

    fs::remove_file(m.scripts_dir().join("002_half.sql")).unwrap();
    let err = m.apply_pending().unwrap_err();
    assert!(matches!(
        err,
        MigrateError::MigrationExecutionError { ref filename, .. } if filename == "003_rollback.sql"
    ));
    assert_eq!(applied(&m), ["001_ok.sql"]);
    assert!(!table_exists(m.connection(), "gone"));
}

#[test]
fn apply_pending_allows_multi_statement_scripts() {
    let (_dir, mut m) = setup();
    let sql = MEDIA_SQL.to_string() + "\nCREATE INDEX idx_media_type ON media(type);\n";
    write_script(&m, "001_media.sql", &sql);
    m.apply_pending().unwrap();

    let count: i64 = m
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_media_type'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

// ---------------------------------------------------------------------------
// ledger
// ---------------------------------------------------------------------------

#[test]
fn duplicate_record_is_rejected_without_effect() {
    let (_dir, m) = setup();
    let ledger = m.ledger();
    ledger
        .record_applied(m.connection(), "001_a.sql", "SELECT 1;")
        .unwrap();
    let err = ledger
        .record_applied(m.connection(), "001_a.sql", "SELECT 2;")
        .unwrap_err();
    assert!(matches!(err, MigrateError::DuplicateMigrationError(_)));
    assert_eq!(ledger.records(m.connection()).unwrap().len(), 1);
}

#[test]
fn ledger_and_schema_share_the_database() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_media.sql", MEDIA_SQL);
    m.apply_pending().unwrap();

    let conn = m.into_connection();
    assert!(table_exists(&conn, "_migrations"));
    assert!(table_exists(&conn, "media"));
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[test]
fn status_reports_pending_missing_and_modified() {
    let (_dir, mut m) = setup();
    write_script(&m, "001_a.sql", "CREATE TABLE a (id INTEGER);");
    write_script(&m, "002_b.sql", "CREATE TABLE b (id INTEGER);");
    m.apply_pending().unwrap();

    fs::remove_file(m.scripts_dir().join("001_a.sql")).unwrap();
    write_script(&m, "002_b.sql", "CREATE TABLE b (id INTEGER, x TEXT);");
    write_script(&m, "003_c.sql", "CREATE TABLE c (id INTEGER);");

    let status = m.status().unwrap();
    assert_eq!(status.applied.len(), 2);
    assert_eq!(status.pending, ["003_c.sql"]);
    assert_eq!(status.missing, ["001_a.sql"]);
    assert_eq!(status.modified, ["002_b.sql"]);
    assert_eq!(status.latest.as_deref(), Some("002_b.sql"));
    assert_eq!(status.next_sequence, 4);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["pending"][0], "003_c.sql");
}

// ---------------------------------------------------------------------------
// file-backed database
// ---------------------------------------------------------------------------

#[test]
fn from_config_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = MigrateConfig {
        database: dir.path().join("data/data.sqlite"),
        migrations_dir: dir.path().join("data/migrations"),
        ..MigrateConfig::default()
    };

    {
        let mut m = Migrator::from_config(&config).unwrap();
        m.bootstrap().unwrap();
        m.create_and_apply("init", MEDIA_SQL).unwrap();
    }

    let mut m = Migrator::from_config(&config).unwrap();
    m.bootstrap().unwrap();
    assert!(m.apply_pending().unwrap().is_empty());
    assert_eq!(applied(&m), ["001_init.sql"]);
    assert_eq!(m.next_sequence().unwrap(), 2);
    assert!(Path::new(&config.migrations_dir).join("001_init.sql").exists());
}
