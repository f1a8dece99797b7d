//! Workbench subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use comfy_table::{CellAlignment, presets::UTF8_FULL_CONDENSED};
use tracing::info;
use viewsync_core::{Align, DoctorReport, FormattedTable, SyncConfig, SyncContext};
use viewsync_model::{CellValue, DatasetName, EntityKind, FetchSpec, PanelId};
use viewsync_store::{MemoryStore, load_for_datasets};

use crate::cli::{DemoArgs, DoctorArgs, RelationsArgs, ShowArgs};

pub fn run_show(args: &ShowArgs) -> anyhow::Result<()> {
    let config = SyncConfig::load(&args.config)?;
    let dataset = DatasetName::new(args.dataset.clone())?;
    if !config.dataset_names().contains(&dataset) {
        bail!("dataset not in config: {dataset}");
    }

    let context = ingest_and_wire(&config, &args.data_dir)?;
    let panel = PanelId::new(format!("show-{dataset}"))?;
    context.panels().bind(
        panel.clone(),
        &dataset,
        silent_notifier(),
        config.format_for(&dataset).cloned(),
    )?;

    let formatted = context.panels().formatted(&panel)?;
    println!("{}", render_table(&formatted));
    let status = context
        .cache()
        .status(&dataset)
        .context("status for bound dataset")?;
    println!(
        "{} row(s){}",
        formatted.rows.len(),
        status
            .loaded_at
            .map(|at| format!(", loaded {}", at.format("%Y-%m-%d %H:%M:%S UTC")))
            .unwrap_or_default()
    );
    Ok(())
}

pub fn run_relations(args: &RelationsArgs) -> anyhow::Result<()> {
    let config = SyncConfig::load(&args.config)?;
    let relations = &config.relations;

    if let Some(entity) = &args.entity {
        let entity = EntityKind::new(entity.clone())?;
        match relations.targets(&entity) {
            Some(targets) => {
                println!("{}", fan_out_table(&[(entity.to_string(), targets.to_vec())]));
            }
            None => {
                println!(
                    "no relation entry for {entity}; a refresh for this kind \
                     refreshes every dataset"
                );
            }
        }
        return Ok(());
    }

    let rows: Vec<(String, Vec<DatasetName>)> = relations
        .entity_kinds()
        .map(|kind| {
            (
                kind.to_string(),
                relations.targets(kind).unwrap_or_default().to_vec(),
            )
        })
        .collect();
    println!("{}", fan_out_table(&rows));
    Ok(())
}

pub fn run_doctor(args: &DoctorArgs) -> anyhow::Result<()> {
    let config = SyncConfig::load(&args.config)?;
    let report = DoctorReport::from_config(&config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = comfy_table::Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["dataset", "columns", "query"]);
    for dataset in &report.datasets {
        table.add_row(vec![
            dataset.name.clone(),
            dataset.columns.to_string(),
            dataset.query.clone(),
        ]);
    }
    println!("{table}");
    println!(
        "config ok: {} dataset(s), {} relation(s), {} format policy(ies)",
        report.counts.datasets, report.counts.relations, report.counts.format_policies
    );
    Ok(())
}

pub fn run_demo(args: &DemoArgs) -> anyhow::Result<()> {
    let config = SyncConfig::load(&args.config)?;
    let store = Arc::new(MemoryStore::new());
    load_for_datasets(&store, &args.data_dir, &config.datasets)
        .with_context(|| format!("ingest CSV data from {}", args.data_dir.display()))?;
    let context = SyncContext::from_config(&config, store.clone())?;

    // One panel per dataset, each announcing its notifications.
    for dataset in context.cache().dataset_names() {
        let panel = PanelId::new(format!("panel-{dataset}"))?;
        context.panels().bind(
            panel,
            &dataset,
            Arc::new(|changed: &DatasetName| {
                println!("  -> view of {changed} notified");
            }),
            config.format_for(&dataset).cloned(),
        )?;
    }

    let entity = EntityKind::new(args.entity.clone())?;
    let mutated = mutation_target(&config, &entity)?;
    let row = demo_row(&store, &mutated)?;
    store.insert_row(&mutated, row)?;
    info!(table = %mutated, "demo row committed");

    println!("mutated {mutated}; refreshing datasets related to {entity}:");
    let outcome = context.coordinator().refresh_related(&entity);
    for (dataset, message) in &outcome.failures {
        println!("  !! {dataset} failed to reload: {message}");
    }

    for dataset in context.cache().dataset_names() {
        let panel = PanelId::new(format!("panel-{dataset}"))?;
        let formatted = context.panels().formatted(&panel)?;
        let state = context.panels().state(&panel);
        println!("\n{dataset} ({state:?}):");
        println!("{}", render_table(&formatted));
    }
    Ok(())
}

fn ingest_and_wire(config: &SyncConfig, data_dir: &Path) -> anyhow::Result<SyncContext> {
    let store = Arc::new(MemoryStore::new());
    load_for_datasets(&store, data_dir, &config.datasets)
        .with_context(|| format!("ingest CSV data from {}", data_dir.display()))?;
    Ok(SyncContext::from_config(config, store)?)
}

fn silent_notifier() -> Arc<dyn viewsync_core::ViewNotifier> {
    Arc::new(|_: &DatasetName| {})
}

/// The store table the demo mutates: the first dataset the entity's
/// fan-out declares, or the first configured dataset for an unmapped kind.
fn mutation_target(config: &SyncConfig, entity: &EntityKind) -> anyhow::Result<String> {
    let dataset = match config.relations.targets(entity) {
        Some([first, ..]) => first.clone(),
        _ => config
            .datasets
            .first()
            .map(|spec| spec.name.clone())
            .context("config defines no datasets")?,
    };
    let spec = config
        .datasets
        .iter()
        .find(|spec| spec.name == dataset)
        .context("relation target missing from datasets")?;
    match &spec.fetch {
        FetchSpec::Query(query) => Ok(query.clone()),
        FetchSpec::Callable(_) => bail!("demo requires query-backed datasets"),
    }
}

fn demo_row(store: &MemoryStore, table: &str) -> anyhow::Result<Vec<CellValue>> {
    let columns = store.columns(table)?;
    let next_id = store.row_count(table)? as i64 + 1;
    Ok(columns
        .iter()
        .enumerate()
        .map(|(index, _)| {
            if index == 0 {
                CellValue::Int(next_id)
            } else {
                CellValue::Text(format!("demo-{next_id}"))
            }
        })
        .collect())
}

fn fan_out_table(rows: &[(String, Vec<DatasetName>)]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["entity", "affected datasets"]);
    for (entity, targets) in rows {
        let affected: Vec<String> = targets.iter().map(ToString::to_string).collect();
        table.add_row(vec![entity.clone(), affected.join(", ")]);
    }
    table
}

fn render_table(formatted: &FormattedTable) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(formatted.headers.clone());
    for row in &formatted.rows {
        table.add_row(row.clone());
    }
    for (index, align) in formatted.aligns.iter().enumerate() {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(match align {
                Align::Left => CellAlignment::Left,
                Align::Right => CellAlignment::Right,
                Align::Center => CellAlignment::Center,
            });
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SyncConfig {
        SyncConfig::parse(
            r#"
[config]
schema = "viewsync.workspace"
schema_version = 1

[[dataset]]
name = "computers"
columns = ["id", "hostname"]
query = "computers"

[[dataset]]
name = "labs"
columns = ["id", "building"]
query = "labs"

[[relation]]
entity = "computer"
affects = ["computers"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_mutation_target_follows_relation() {
        let config = sample_config();
        let target =
            mutation_target(&config, &EntityKind::new("computer").unwrap()).unwrap();
        assert_eq!(target, "computers");

        // Unmapped kinds fall back to the first configured dataset.
        let target = mutation_target(&config, &EntityKind::new("gadget").unwrap()).unwrap();
        assert_eq!(target, "computers");
    }

    #[test]
    fn test_render_table_carries_headers_and_rows() {
        let formatted = FormattedTable {
            headers: vec!["id".to_string(), "Host".to_string()],
            aligns: vec![Align::Right, Align::Left],
            rows: vec![vec!["1".to_string(), "ws-01".to_string()]],
        };
        let rendered = render_table(&formatted).to_string();
        assert!(rendered.contains("Host"));
        assert!(rendered.contains("ws-01"));
    }
}
