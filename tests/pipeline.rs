use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use imdb_snapshot_loader::ingestion::{bulk, gate, provision, sanitize, Pipeline, PipelineOptions};
use imdb_snapshot_loader::registry::TableRegistry;
use imdb_snapshot_loader::store::MemoryStore;
use imdb_snapshot_loader::types::{BulkFormat, Column, IndexDef, LoadStatus, TableSpec};
use imdb_snapshot_loader::PipelineError;

const TRIPLE_COLUMNS: &[Column] = &[Column::text("a"), Column::text("b"), Column::text("c")];
const TRIPLE_INDEXES: &[IndexDef] = &[IndexDef::new("idx_triples_b", "b")];
const PAIR_COLUMNS: &[Column] = &[Column::text("k"), Column::integer("v")];

/// Header plus two well-formed and two malformed rows.
const TRIPLES_TSV: &str = "h1\th2\th3\na\tb\tc\na\tb\na\tb\t\na\tb\tc\td\n";

fn triples() -> TableSpec {
    TableSpec {
        name: "triples",
        source_file: "triples.tsv",
        columns: TRIPLE_COLUMNS,
        primary_key: Some("a"),
        indexes: TRIPLE_INDEXES,
        expected_column_count: 3,
        format: BulkFormat::permissive_tsv(),
    }
}

fn pairs() -> TableSpec {
    TableSpec {
        name: "pairs",
        source_file: "pairs.tsv",
        columns: PAIR_COLUMNS,
        primary_key: None,
        indexes: &[],
        expected_column_count: 2,
        format: BulkFormat::strict_tsv(),
    }
}

fn test_registry() -> TableRegistry {
    TableRegistry::new(vec![triples(), pairs()]).unwrap()
}

fn data_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("imdb-snapshot-loader-{tag}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("triples.tsv"), TRIPLES_TSV).unwrap();
    fs::write(dir.join("pairs.tsv"), "k\tv\nx\t1\ny\t\"2\ncorrupt\n").unwrap();
    dir
}

fn options(dir: &Path) -> PipelineOptions {
    PipelineOptions {
        data_root: dir.to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn end_to_end_loads_well_formed_rows_once() {
    let dir = data_dir("e2e");
    let registry = test_registry();
    let pipeline = Pipeline::new(&registry, options(&dir));
    let mut store = MemoryStore::new();

    let first = pipeline.run(&mut store).unwrap();
    assert_eq!(store.row_count("triples"), Some(2));
    assert_eq!(first.outcomes[0].status, LoadStatus::Loaded);
    assert_eq!(first.outcomes[0].rows_loaded, 2);
    assert_eq!(first.outcomes[0].rows_dropped, 2);
    assert!(first.outcomes[0].maintained);

    let rows = &store.table("triples").unwrap().rows;
    assert_eq!(rows[0], vec![Some("a".into()), Some("b".into()), Some("c".into())]);
    assert_eq!(rows[1], vec![Some("a".into()), Some("b".into()), Some(String::new())]);

    let second = pipeline.run(&mut store).unwrap();
    assert_eq!(store.row_count("triples"), Some(2));
    assert_eq!(second.outcomes[0].status, LoadStatus::Skipped);
    assert_eq!(second.rows_loaded(), 0);
}

#[test]
fn second_run_performs_no_copies() {
    let dir = data_dir("idempotent");
    let registry = test_registry();
    let pipeline = Pipeline::new(&registry, options(&dir));
    let mut store = MemoryStore::new();

    pipeline.run(&mut store).unwrap();
    assert_eq!(store.copies_performed(), 2);
    let counts = (store.row_count("triples"), store.row_count("pairs"));

    let report = pipeline.run(&mut store).unwrap();
    assert_eq!(store.copies_performed(), 2);
    assert_eq!((store.row_count("triples"), store.row_count("pairs")), counts);
    assert_eq!(report.tables_skipped(), 2);
    assert_eq!(pipeline.metrics().snapshot().copies, 0);
}

#[test]
fn strict_format_treats_quotes_as_data_and_empty_as_null() {
    let dir = data_dir("strict");
    fs::write(dir.join("pairs.tsv"), "k\tv\nx\t\n\"q\t7\n").unwrap();
    let registry = test_registry();
    let mut opts = options(&dir);
    opts.tables = Some(vec!["pairs".to_string()]);
    let mut store = MemoryStore::new();

    Pipeline::new(&registry, opts).run(&mut store).unwrap();
    let rows = &store.table("pairs").unwrap().rows;
    assert_eq!(rows[0], vec![Some("x".into()), None]);
    assert_eq!(rows[1], vec![Some("\"q".into()), Some("7".into())]);
}

#[test]
fn ensure_schema_twice_is_idempotent() {
    let spec = triples();
    let mut store = MemoryStore::new();

    provision::ensure_schema(&mut store, &spec).unwrap();
    let first = (store.table("triples").cloned(), store.indexes_on("triples").len());
    provision::ensure_schema(&mut store, &spec).unwrap();
    let second = (store.table("triples").cloned(), store.indexes_on("triples").len());

    assert_eq!(first, second);
    assert_eq!(store.indexes_on("triples"), vec!["idx_triples_b"]);
    assert_eq!(
        store.ddl_statements()[0],
        "CREATE TABLE IF NOT EXISTS triples (a TEXT, b TEXT, c TEXT, PRIMARY KEY (a))"
    );
}

#[test]
fn gate_flips_after_successful_load() {
    let dir = data_dir("gate");
    let spec = triples();
    let mut store = MemoryStore::new();
    provision::ensure_schema(&mut store, &spec).unwrap();
    assert!(gate::should_load(&mut store, &spec).unwrap());

    let artifact = sanitize::clean(&dir.join("triples.tsv"), &spec, ".tsv.cleaned").unwrap();
    let cleaned_lines = fs::read_to_string(artifact.path()).unwrap().lines().count() as u64;
    let rows = bulk::load(&mut store, &spec, artifact.path()).unwrap();

    assert_eq!(rows, cleaned_lines);
    assert!(!gate::should_load(&mut store, &spec).unwrap());
    assert_eq!(
        gate::check(&mut store, &spec).unwrap(),
        gate::GateDecision::Skip { existing_rows: 2 }
    );
}

#[test]
fn externally_emptied_table_is_reloaded() {
    let dir = data_dir("reload");
    let registry = test_registry();
    let pipeline = Pipeline::new(&registry, options(&dir));
    let mut store = MemoryStore::new();

    pipeline.run(&mut store).unwrap();
    store.truncate("triples").unwrap();
    let report = pipeline.run(&mut store).unwrap();

    assert_eq!(report.outcomes[0].status, LoadStatus::Loaded);
    assert_eq!(report.outcomes[1].status, LoadStatus::Skipped);
    assert_eq!(store.row_count("triples"), Some(2));
}

#[test]
fn missing_input_aborts_before_schema_work() {
    let dir = data_dir("missing");
    fs::remove_file(dir.join("pairs.tsv")).unwrap();
    let registry = test_registry();
    let mut store = MemoryStore::new();

    let err = Pipeline::new(&registry, options(&dir)).run(&mut store).unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput { ref table, .. } if table == "pairs"));
    assert_eq!(store.row_count("triples"), Some(2));
    assert!(store.table("pairs").is_none());
}

#[test]
fn copy_failure_keeps_earlier_tables_and_skips_later_ones() {
    let dir = data_dir("copy-fail");
    let registry = test_registry();
    let mut store = MemoryStore::new().fail_copy_for("triples");

    let err = Pipeline::new(&registry, options(&dir)).run(&mut store).unwrap_err();
    assert!(matches!(err, PipelineError::Store { .. }));
    assert_eq!(store.row_count("triples"), Some(0));
    assert!(store.table("pairs").is_none());

    // Restart after the fault clears: nothing was half-recorded, so the table loads normally.
    let mut store = MemoryStore::new();
    let report = Pipeline::new(&registry, options(&dir)).run(&mut store).unwrap();
    assert_eq!(report.tables_loaded(), 2);
}

#[test]
fn maintenance_failure_is_not_fatal() {
    let dir = data_dir("maintenance");
    let registry = test_registry();
    let pipeline = Pipeline::new(&registry, options(&dir));
    let mut store = MemoryStore::new().with_failing_maintenance();

    let report = pipeline.run(&mut store).unwrap();
    assert_eq!(report.tables_loaded(), 2);
    assert!(report.outcomes.iter().all(|o| !o.maintained));
    assert_eq!(pipeline.metrics().snapshot().maintenance_failures, 2);
}

#[test]
fn skip_maintenance_issues_no_maintenance_calls() {
    let dir = data_dir("skip-maintenance");
    let registry = test_registry();
    let mut opts = options(&dir);
    opts.skip_maintenance = true;
    let mut store = MemoryStore::new();

    Pipeline::new(&registry, opts).run(&mut store).unwrap();
    assert_eq!(store.maintenance_runs(), 0);
}

#[test]
fn table_subset_runs_in_registry_order() {
    let dir = data_dir("subset");
    let registry = test_registry();
    let mut opts = options(&dir);
    opts.tables = Some(vec!["pairs".to_string(), "triples".to_string()]);
    let mut store = MemoryStore::new();

    let report = Pipeline::new(&registry, opts).run(&mut store).unwrap();
    let order = report.outcomes.iter().map(|o| o.table.as_str()).collect::<Vec<_>>();
    assert_eq!(order, vec!["triples", "pairs"]);
}

#[test]
fn unknown_table_is_configuration_error() {
    let dir = data_dir("unknown");
    let registry = test_registry();
    let mut opts = options(&dir);
    opts.tables = Some(vec!["title_plot".to_string()]);
    let mut store = MemoryStore::new();

    let err = Pipeline::new(&registry, opts).run(&mut store).unwrap_err();
    assert!(matches!(err, PipelineError::Configuration { .. }));
    assert!(store.ddl_statements().is_empty());
}

#[test]
fn cleaned_artifacts_are_removed_by_default_and_kept_on_request() {
    let dir = data_dir("artifacts");
    let registry = test_registry();
    let mut store = MemoryStore::new();
    Pipeline::new(&registry, options(&dir)).run(&mut store).unwrap();
    assert!(!dir.join("triples.tsv.cleaned").exists());

    let mut opts = options(&dir);
    opts.keep_cleaned = true;
    let mut store = MemoryStore::new();
    Pipeline::new(&registry, opts).run(&mut store).unwrap();
    assert_eq!(
        fs::read_to_string(dir.join("triples.tsv.cleaned")).unwrap(),
        "a\tb\tc\na\tb\t\n"
    );
}

#[test]
fn imdb_ratings_snapshot_loads_through_builtin_registry() {
    let dir = data_dir("imdb");
    fs::write(
        dir.join("title_ratings.tsv"),
        "tconst\taverageRating\tnumVotes\ntt0000001\t5.7\t2090\ntt0000002\t5.6\nnot a row\ntt0000003\t6.5\t2017\n",
    )
    .unwrap();
    let registry = TableRegistry::imdb();
    let mut opts = options(&dir);
    opts.tables = Some(vec!["title_ratings".to_string()]);
    let mut store = MemoryStore::new();

    let report = Pipeline::new(&registry, opts).run(&mut store).unwrap();
    assert_eq!(report.rows_loaded(), 2);
    assert_eq!(report.outcomes[0].rows_dropped, 2);
    assert_eq!(store.indexes_on("title_ratings"), vec!["idx_title_ratings_rating"]);
}

#[test]
fn carriage_return_only_snapshot_loads_every_row() {
    let dir = data_dir("cr-only");
    fs::write(dir.join("triples.tsv"), "h1\th2\th3\ra\tb\tc\r\rd\te\tf\r").unwrap();
    let registry = test_registry();
    let mut opts = options(&dir);
    opts.tables = Some(vec!["triples".to_string()]);
    let mut store = MemoryStore::new();

    let report = Pipeline::new(&registry, opts).run(&mut store).unwrap();
    assert_eq!(store.row_count("triples"), Some(2));
    assert_eq!(report.outcomes[0].rows_dropped, 1);
}

#[test]
fn failed_run_still_records_elapsed_time() {
    let dir = data_dir("failed-elapsed");
    let registry = test_registry();
    let pipeline = Pipeline::new(&registry, options(&dir));
    let mut store = MemoryStore::new().fail_copy_for("pairs");

    assert!(pipeline.run(&mut store).is_err());
    let snapshot = pipeline.metrics().snapshot();
    assert!(snapshot.elapsed.is_some());
    assert_eq!(snapshot.tables_loaded, 1);
}
