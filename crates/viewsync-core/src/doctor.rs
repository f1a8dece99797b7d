#![deny(unsafe_code)]

use viewsync_model::FetchSpec;

use crate::config::{CONFIG_SCHEMA, CONFIG_SCHEMA_VERSION, SyncConfig};

/// Serializable summary of a validated configuration, for the `doctor`
/// command and support bundles.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DoctorReport {
    pub schema: String,
    pub schema_version: u32,
    pub counts: DoctorCounts,
    pub datasets: Vec<DatasetSummary>,
    pub relations: Vec<RelationSummary>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DoctorCounts {
    pub datasets: usize,
    pub relations: usize,
    pub format_policies: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub columns: usize,
    pub query: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationSummary {
    pub entity: String,
    pub affects: Vec<String>,
}

impl DoctorReport {
    pub fn from_config(config: &SyncConfig) -> Self {
        let datasets = config
            .datasets
            .iter()
            .map(|spec| DatasetSummary {
                name: spec.name.to_string(),
                columns: spec.columns.len(),
                query: match &spec.fetch {
                    FetchSpec::Query(q) => q.clone(),
                    FetchSpec::Callable(_) => "<callable>".to_string(),
                },
            })
            .collect();
        let relations = config
            .relations
            .entity_kinds()
            .map(|kind| RelationSummary {
                entity: kind.to_string(),
                affects: config
                    .relations
                    .targets(kind)
                    .unwrap_or_default()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect();

        Self {
            schema: CONFIG_SCHEMA.to_string(),
            schema_version: CONFIG_SCHEMA_VERSION,
            counts: DoctorCounts {
                datasets: config.datasets.len(),
                relations: config.relations.len(),
                format_policies: config.formats.len(),
            },
            datasets,
            relations,
        }
    }
}
