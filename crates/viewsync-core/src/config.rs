#![deny(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use viewsync_model::{DatasetName, DatasetSpec, EntityKind, ModelError};

use crate::format::FormatPolicy;
use crate::relations::RelationMap;

pub const CONFIG_SCHEMA: &str = "viewsync.workspace";
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {source}")]
    Toml {
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported config schema: {schema}")]
    UnsupportedSchema { schema: String },

    #[error("unsupported config schema_version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("config defines no datasets")]
    NoDatasets,

    #[error("invalid name in config: {0}")]
    InvalidName(#[from] ModelError),

    #[error("duplicate dataset in config: {0}")]
    DuplicateDataset(DatasetName),

    #[error("dataset {dataset} declares no columns")]
    EmptyColumns { dataset: DatasetName },

    #[error("duplicate column {column} in dataset {dataset}")]
    DuplicateColumn {
        dataset: DatasetName,
        column: String,
    },

    #[error("duplicate relation entry for entity kind: {0}")]
    DuplicateRelation(EntityKind),

    #[error("relation for {entity} references unknown dataset: {dataset}")]
    DanglingRelation {
        entity: EntityKind,
        dataset: DatasetName,
    },

    #[error("format policy references unknown dataset: {0}")]
    UnknownFormatDataset(DatasetName),

    #[error("format policy for {dataset} references unknown column: {column}")]
    UnknownFormatColumn {
        dataset: DatasetName,
        column: String,
    },
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    config: ConfigMeta,
    #[serde(default, rename = "dataset")]
    datasets: Vec<DatasetConfig>,
    #[serde(default, rename = "relation")]
    relations: Vec<RelationConfig>,
    #[serde(default)]
    format: BTreeMap<String, FormatPolicy>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigMeta {
    schema: String,
    schema_version: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetConfig {
    name: String,
    columns: Vec<String>,
    query: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationConfig {
    entity: String,
    affects: Vec<String>,
}

/// Validated startup configuration: the registered datasets, the
/// entity-relationship map, and per-dataset display policies.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub datasets: Vec<DatasetSpec>,
    pub relations: RelationMap,
    pub formats: BTreeMap<DatasetName, FormatPolicy>,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents)?;
        info!(
            path = %path.display(),
            datasets = config.datasets.len(),
            relations = config.relations.len(),
            "config loaded"
        );
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|source| ConfigError::Toml { source })?;
        validate_meta(&file.config)?;
        if file.datasets.is_empty() {
            return Err(ConfigError::NoDatasets);
        }

        let mut datasets = Vec::with_capacity(file.datasets.len());
        let mut known: BTreeSet<DatasetName> = BTreeSet::new();
        for dataset in file.datasets {
            let name = DatasetName::new(dataset.name)?;
            if !known.insert(name.clone()) {
                return Err(ConfigError::DuplicateDataset(name));
            }
            validate_columns(&name, &dataset.columns)?;
            datasets.push(DatasetSpec::with_query(name, dataset.columns, dataset.query));
        }

        let mut relations = RelationMap::new();
        let mut seen_kinds: BTreeSet<EntityKind> = BTreeSet::new();
        for relation in file.relations {
            let entity = EntityKind::new(relation.entity)?;
            if !seen_kinds.insert(entity.clone()) {
                return Err(ConfigError::DuplicateRelation(entity));
            }
            let affects = relation
                .affects
                .into_iter()
                .map(DatasetName::new)
                .collect::<Result<Vec<_>, _>>()?;
            relations.insert(entity, affects);
        }
        relations.validate(&known)?;

        let mut formats = BTreeMap::new();
        for (dataset, policy) in file.format {
            let name = DatasetName::new(dataset)?;
            let Some(spec) = datasets.iter().find(|spec| spec.name == name) else {
                return Err(ConfigError::UnknownFormatDataset(name));
            };
            for column in policy.columns.keys() {
                if !spec.columns.contains(column) {
                    return Err(ConfigError::UnknownFormatColumn {
                        dataset: name.clone(),
                        column: column.clone(),
                    });
                }
            }
            formats.insert(name, policy);
        }

        Ok(Self {
            datasets,
            relations,
            formats,
        })
    }

    pub fn dataset_names(&self) -> BTreeSet<DatasetName> {
        self.datasets.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn format_for(&self, name: &DatasetName) -> Option<&FormatPolicy> {
        self.formats.get(name)
    }
}

fn validate_meta(meta: &ConfigMeta) -> Result<(), ConfigError> {
    if meta.schema != CONFIG_SCHEMA {
        return Err(ConfigError::UnsupportedSchema {
            schema: meta.schema.clone(),
        });
    }
    if meta.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            version: meta.schema_version,
        });
    }
    Ok(())
}

fn validate_columns(dataset: &DatasetName, columns: &[String]) -> Result<(), ConfigError> {
    if columns.is_empty() {
        return Err(ConfigError::EmptyColumns {
            dataset: dataset.clone(),
        });
    }
    let mut seen = BTreeSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                dataset: dataset.clone(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}
