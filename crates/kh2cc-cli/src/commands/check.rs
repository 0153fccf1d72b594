//! Check command: validate the conflict table.

use anyhow::{Context, Result};
use kh2cc::{SymmetryPolicy, catalog};

pub fn run(policy: SymmetryPolicy) -> Result<()> {
    // Build as written first so the one-sided pairs can be listed even when
    // the requested policy rejects them
    let (definitions, written) = catalog::build(SymmetryPolicy::AsWritten)?;
    eprintln!(
        "{} effects, {} with conflict entries",
        definitions.len(),
        written.len()
    );

    let lines = describe_asymmetries(written.asymmetries());
    if lines.is_empty() {
        println!("Conflict table is symmetric");
    } else {
        println!("One-sided conflict entries:");
        for line in lines {
            println!("  {}", line);
        }
    }

    catalog::build(policy).with_context(|| format!("catalog rejected under policy {}", policy))?;
    println!("Catalog accepted under policy {}", policy);

    Ok(())
}

fn describe_asymmetries(pairs: &[(String, String)]) -> Vec<String> {
    pairs
        .iter()
        .map(|(owner, other)| format!("{} lists {}, but {} does not list {}", owner, other, other, owner))
        .collect()
}
