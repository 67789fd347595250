//! Constellation name interning.
//!
//! Constellations are addressed by dense integer ids everywhere inside the
//! planner; names only appear at the Python boundary and in logs.

use rustc_hash::FxHashMap;

/// Dense constellation id (index into the graph's constellation list).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstellationId(pub u32);

impl ConstellationId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Normalise a user-facing name for lookups: lowercase, without `,` and `'`.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace([',', '\''], "")
        .trim()
        .to_string()
}

/// Bidirectional map between constellation names and ids.
#[derive(Debug, Clone, Default)]
pub struct NameInterner {
    to_id: FxHashMap<String, ConstellationId>,
    normalized: FxHashMap<String, ConstellationId>,
    names: Vec<String>,
}

impl NameInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            normalized: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            names: Vec::with_capacity(capacity),
        }
    }

    /// Intern a name. Returns `None` if the name was already present.
    pub fn insert(&mut self, name: &str) -> Option<ConstellationId> {
        if self.to_id.contains_key(name) {
            return None;
        }
        let id = ConstellationId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.to_id.insert(name.to_string(), id);
        self.normalized.insert(normalize_name(name), id);
        Some(id)
    }

    /// Exact lookup.
    #[inline]
    pub fn get(&self, name: &str) -> Option<ConstellationId> {
        self.to_id.get(name).copied()
    }

    /// Lookup that ignores case, commas and apostrophes.
    pub fn find(&self, name: &str) -> Option<ConstellationId> {
        self.get(name)
            .or_else(|| self.normalized.get(&normalize_name(name)).copied())
    }

    #[inline]
    pub fn resolve(&self, id: ConstellationId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
