//! List command: dump the effect catalog.

use anyhow::Result;
use kh2cc::{Config, EffectKind, Variant, catalog};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct EffectRow {
    id: String,
    kind: EffectKind,
    duration_ms: Option<u128>,
    refresh_interval_ms: Option<u128>,
    variants: Vec<Variant>,
    restore_on_stop_all: bool,
    conflicts: Vec<String>,
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let (definitions, conflicts) = catalog::build(config.conflicts.policy)?;

    let mut rows: Vec<EffectRow> = definitions
        .iter()
        .map(|definition| EffectRow {
            id: definition.id().to_string(),
            kind: definition.kind(),
            duration_ms: definition.expires().then(|| definition.duration().as_millis()),
            refresh_interval_ms: (definition.kind() == EffectKind::RepeatAction)
                .then(|| definition.refresh_interval().as_millis()),
            variants: definition.variants().to_vec(),
            restore_on_stop_all: definition.restore_on_stop_all(),
            conflicts: conflicts.conflicts(definition.id()).map(str::to_string).collect(),
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<22} {:<14} {:>8}  conflicts", "effect", "kind", "duration");
    for row in &rows {
        let duration = row
            .duration_ms
            .map_or_else(|| "-".to_string(), |ms| format!("{}s", ms / 1000));
        println!(
            "{:<22} {:<14} {:>8}  {}",
            row.id,
            row.kind.to_string(),
            duration,
            row.conflicts.join(", ")
        );
    }
    eprintln!("{} effects", rows.len());

    Ok(())
}
