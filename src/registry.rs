//! TableSpec registry.
//!
//! The registry is the single source of per-table schema and format metadata. It is built
//! once at process start (usually via [`TableRegistry::imdb`]), validated on construction,
//! and passed by reference to the pipeline. Nothing mutates it afterwards.

use std::collections::HashSet;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{BulkFormat, Column, IndexDef, TableSpec};

/// Immutable, ordered catalog of [`TableSpec`]s.
///
/// Iteration order is the order the specs were supplied in, and is the order the pipeline
/// processes tables in.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    specs: Vec<TableSpec>,
}

impl TableRegistry {
    /// Build a registry from `specs`, validating each definition.
    ///
    /// Fails with [`PipelineError::Configuration`] on duplicate table names, an empty column
    /// list, an `expected_column_count` that differs from the column count, or a primary key
    /// / index that names an undeclared column.
    pub fn new(specs: Vec<TableSpec>) -> PipelineResult<Self> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name) {
                return Err(PipelineError::configuration(format!(
                    "duplicate table '{}'",
                    spec.name
                )));
            }
            validate_spec(spec)?;
        }
        Ok(Self { specs })
    }

    /// The built-in IMDb snapshot catalog.
    pub fn imdb() -> Self {
        Self {
            specs: vec![
                NAME_BASICS,
                TITLE_BASICS,
                TITLE_AKAS,
                TITLE_PRINCIPALS,
                TITLE_RATINGS,
                TITLE_CREW,
                TITLE_EPISODE,
            ],
        }
    }

    /// Look up a table by name.
    pub fn spec_for(&self, table: &str) -> PipelineResult<&TableSpec> {
        self.specs
            .iter()
            .find(|s| s.name == table)
            .ok_or_else(|| PipelineError::configuration(format!("unknown table '{table}'")))
    }

    /// Resolve `tables` into specs, returned in registry order regardless of input order.
    pub fn select<S: AsRef<str>>(&self, tables: &[S]) -> PipelineResult<Vec<&TableSpec>> {
        for t in tables {
            self.spec_for(t.as_ref())?;
        }
        Ok(self
            .specs
            .iter()
            .filter(|s| tables.iter().any(|t| t.as_ref() == s.name))
            .collect())
    }

    /// Iterate all specs in processing order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn validate_spec(spec: &TableSpec) -> PipelineResult<()> {
    if spec.columns.is_empty() {
        return Err(PipelineError::configuration(format!(
            "table '{}' declares no columns",
            spec.name
        )));
    }
    if spec.expected_column_count != spec.columns.len() {
        return Err(PipelineError::configuration(format!(
            "table '{}' expects {} raw fields but declares {} columns",
            spec.name,
            spec.expected_column_count,
            spec.columns.len()
        )));
    }
    if let Some(pk) = spec.primary_key {
        if !spec.has_column(pk) {
            return Err(PipelineError::configuration(format!(
                "table '{}' primary key '{pk}' is not a declared column",
                spec.name
            )));
        }
    }
    for idx in spec.indexes {
        if !spec.has_column(idx.column) {
            return Err(PipelineError::configuration(format!(
                "index '{}' on table '{}' names undeclared column '{}'",
                idx.name, spec.name, idx.column
            )));
        }
    }
    Ok(())
}

const NAME_BASICS: TableSpec = TableSpec {
    name: "name_basics",
    source_file: "name_basics.tsv",
    columns: &[
        Column::text("nconst"),
        Column::text("primaryName"),
        Column::text("birthYear"),
        Column::text("deathYear"),
        Column::text("primaryProfession"),
        Column::text("knownForTitles"),
    ],
    primary_key: Some("nconst"),
    indexes: &[IndexDef::new("idx_name_basics_primaryName", "primaryName")],
    expected_column_count: 6,
    format: BulkFormat::strict_tsv(),
};

const TITLE_BASICS: TableSpec = TableSpec {
    name: "title_basics",
    source_file: "title_basics.tsv",
    columns: &[
        Column::text("tconst"),
        Column::text("titleType"),
        Column::text("primaryTitle"),
        Column::text("originalTitle"),
        Column::text("isAdult"),
        Column::text("startYear"),
        Column::text("endYear"),
        Column::text("runtimeMinutes"),
        Column::text("genres"),
    ],
    primary_key: Some("tconst"),
    indexes: &[IndexDef::new("idx_title_basics_primaryTitle", "primaryTitle")],
    expected_column_count: 9,
    format: BulkFormat::strict_tsv(),
};

const TITLE_AKAS: TableSpec = TableSpec {
    name: "title_akas",
    source_file: "title_akas.tsv",
    columns: &[
        Column::text("titleId"),
        Column::integer("ordering"),
        Column::text("title"),
        Column::text("region"),
        Column::text("language"),
        Column::text("types"),
        Column::text("attributes"),
        Column::text("isOriginalTitle"),
    ],
    primary_key: None,
    indexes: &[
        IndexDef::new("idx_titleAkas_title", "title"),
        IndexDef::new("idx_titleAkas_language", "language"),
    ],
    expected_column_count: 8,
    format: BulkFormat::permissive_tsv(),
};

const TITLE_PRINCIPALS: TableSpec = TableSpec {
    name: "title_principals",
    source_file: "title_principals.tsv",
    columns: &[
        Column::text("tconst"),
        Column::integer("ordering"),
        Column::text("nconst"),
        Column::text("category"),
        Column::text("job"),
        Column::text("characters"),
    ],
    primary_key: None,
    indexes: &[IndexDef::new("idx_title_principals_nconst", "nconst")],
    expected_column_count: 6,
    format: BulkFormat::strict_tsv(),
};

const TITLE_RATINGS: TableSpec = TableSpec {
    name: "title_ratings",
    source_file: "title_ratings.tsv",
    columns: &[
        Column::text("tconst"),
        Column::float("averageRating"),
        Column::integer("numVotes"),
    ],
    primary_key: Some("tconst"),
    indexes: &[IndexDef::descending(
        "idx_title_ratings_rating",
        "averageRating",
    )],
    expected_column_count: 3,
    format: BulkFormat::strict_tsv(),
};

const TITLE_CREW: TableSpec = TableSpec {
    name: "title_crew",
    source_file: "title_crew.tsv",
    columns: &[
        Column::text("tconst"),
        Column::text("directors"),
        Column::text("writers"),
    ],
    primary_key: Some("tconst"),
    indexes: &[],
    expected_column_count: 3,
    format: BulkFormat::permissive_tsv(),
};

const TITLE_EPISODE: TableSpec = TableSpec {
    name: "title_episode",
    source_file: "title_episode.tsv",
    columns: &[
        Column::text("tconst"),
        Column::text("parentTconst"),
        Column::text("seasonNumber"),
        Column::text("episodeNumber"),
    ],
    primary_key: Some("tconst"),
    indexes: &[],
    expected_column_count: 4,
    format: BulkFormat::permissive_tsv(),
};

#[cfg(test)]
mod tests {
    use super::TableRegistry;
    use crate::types::{BulkFormat, Column, IndexDef, TableSpec};

    const PAIR: &[Column] = &[Column::text("a"), Column::text("b")];

    fn pair_spec(name: &'static str) -> TableSpec {
        TableSpec {
            name,
            source_file: "pair.tsv",
            columns: PAIR,
            primary_key: Some("a"),
            indexes: &[],
            expected_column_count: 2,
            format: BulkFormat::permissive_tsv(),
        }
    }

    #[test]
    fn imdb_catalog_passes_validation() {
        let builtin = TableRegistry::imdb();
        let specs = builtin.tables().cloned().collect::<Vec<_>>();
        let validated = TableRegistry::new(specs).unwrap();
        assert_eq!(validated.len(), 7);
    }

    #[test]
    fn imdb_catalog_order_is_stable() {
        let names = TableRegistry::imdb()
            .tables()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "name_basics",
                "title_basics",
                "title_akas",
                "title_principals",
                "title_ratings",
                "title_crew",
                "title_episode",
            ]
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = TableRegistry::new(vec![pair_spec("t"), pair_spec("t")]).unwrap_err();
        assert!(err.to_string().contains("duplicate table 't'"));
    }

    #[test]
    fn rejects_column_count_mismatch() {
        let mut spec = pair_spec("t");
        spec.expected_column_count = 3;
        let err = TableRegistry::new(vec![spec]).unwrap_err();
        assert!(err.to_string().contains("expects 3 raw fields but declares 2 columns"));
    }

    #[test]
    fn rejects_index_on_unknown_column() {
        const BAD: &[IndexDef] = &[IndexDef::new("idx_t_z", "z")];
        let mut spec = pair_spec("t");
        spec.indexes = BAD;
        let err = TableRegistry::new(vec![spec]).unwrap_err();
        assert!(err.to_string().contains("undeclared column 'z'"));
    }

    #[test]
    fn rejects_unknown_primary_key() {
        let mut spec = pair_spec("t");
        spec.primary_key = Some("nope");
        assert!(TableRegistry::new(vec![spec]).is_err());
    }
}
