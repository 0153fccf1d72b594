//! Mutual-exclusion groups between effects.
//!
//! Entries are authored by hand, one list per effect, and in practice do not
//! always mention each other in both directions. [`SymmetryPolicy`] decides
//! what happens to such one-sided pairs when the registry is built.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::effect::DefinitionRegistry;
use crate::error::{Error, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SymmetryPolicy {
    /// Add the missing reverse edge and warn about it
    #[default]
    Symmetrize,
    /// Refuse to start with one-sided pairs
    Strict,
    /// Keep entries exactly as written
    AsWritten,
}

/// `effect id -> ids that may not run at the same time`
#[derive(Debug, Default, Clone)]
pub struct ConflictRegistry {
    entries: HashMap<String, BTreeSet<String>>,
    asymmetries: Vec<(String, String)>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from authored entries.
    ///
    /// Every id mentioned must exist in `definitions`, and each effect may
    /// have at most one entry.
    pub fn from_entries<I, S, L>(
        entries: I,
        definitions: &DefinitionRegistry,
        policy: SymmetryPolicy,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        let mut table: HashMap<String, BTreeSet<String>> = HashMap::new();

        for (owner, list) in entries {
            let owner = owner.into();
            if !definitions.contains(&owner) {
                return Err(Error::Config(format!(
                    "conflict entry for unknown effect {}",
                    owner
                )));
            }
            if table.contains_key(&owner) {
                return Err(Error::Config(format!(
                    "duplicate conflict entry for {}",
                    owner
                )));
            }

            let mut set = BTreeSet::new();
            for id in list {
                let id = id.into();
                if !definitions.contains(&id) {
                    return Err(Error::UnknownConflictId { owner, id });
                }
                set.insert(id);
            }
            table.insert(owner, set);
        }

        let asymmetries = find_asymmetries(&table);

        match policy {
            SymmetryPolicy::Strict => {
                if let Some((a, b)) = asymmetries.first() {
                    return Err(Error::Config(format!(
                        "{} conflicts with {} but not the other way round ({} one-sided pairs)",
                        a,
                        b,
                        asymmetries.len()
                    )));
                }
            }
            SymmetryPolicy::Symmetrize => {
                for (a, b) in &asymmetries {
                    warn!("Conflict {} -> {} is one-sided, adding {} -> {}", a, b, b, a);
                    table.entry(b.clone()).or_default().insert(a.clone());
                }
            }
            SymmetryPolicy::AsWritten => {}
        }

        Ok(Self {
            entries: table,
            asymmetries,
        })
    }

    /// Ids listed for `id`, exactly as stored
    pub fn conflicts(&self, id: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Everything a request for `id` must hold, always including `id` itself
    pub fn conflict_set(&self, id: &str) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self.conflicts(id).map(str::to_string).collect();
        set.insert(id.to_string());
        set
    }

    /// Whether either side lists the other
    pub fn in_conflict(&self, a: &str, b: &str) -> bool {
        a == b || self.lists(a, b) || self.lists(b, a)
    }

    /// One-sided pairs `(a, b)` found in the authored entries: `a` lists `b`
    /// but `b` does not list `a`. Reported regardless of policy.
    pub fn asymmetries(&self) -> &[(String, String)] {
        &self.asymmetries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lists(&self, owner: &str, id: &str) -> bool {
        self.entries.get(owner).is_some_and(|set| set.contains(id))
    }
}

fn find_asymmetries(table: &HashMap<String, BTreeSet<String>>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = table
        .iter()
        .flat_map(|(owner, set)| {
            set.iter()
                .filter(move |id| *id != owner)
                .filter(move |id| !table.get(*id).is_some_and(|back| back.contains(owner)))
                .map(move |id| (owner.clone(), id.clone()))
        })
        .collect();
    pairs.sort();
    pairs
}
