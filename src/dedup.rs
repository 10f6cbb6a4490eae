//! Natural-key deduplication.
//!
//! A [`NaturalKeyMap`] folds repeated observations of the same entity into one
//! accumulator per key. Keys keep first-seen order, which is the order
//! entities are emitted in.

use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};

/// Per-key state built up from observations.
pub trait Accumulator {
    type Observation;

    /// State for a key seen for the first time
    fn start(observation: Self::Observation) -> Self;

    /// Fold a later observation of the same key into the state
    fn merge(&mut self, observation: Self::Observation);
}

/// Set membership only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence;

impl Accumulator for Presence {
    type Observation = ();

    fn start(_: ()) -> Self {
        Presence
    }

    fn merge(&mut self, _: ()) {}
}

/// One row of an address listing: the street's area and (maybe) a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetSighting {
    pub area_id: i64,
    pub number: Option<String>,
}

/// Everything known about one street: the first area id observed and every
/// distinct street number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetAccumulator {
    pub area_id: i64,
    pub numbers: IndexSet<String>,
}

impl StreetAccumulator {
    /// One entry per stored number, or a single `None` if there are none.
    pub fn expand(&self) -> Vec<Option<String>> {
        if self.numbers.is_empty() {
            vec![None]
        } else {
            self.numbers.iter().cloned().map(Some).collect()
        }
    }
}

impl Accumulator for StreetAccumulator {
    type Observation = StreetSighting;

    fn start(sighting: StreetSighting) -> Self {
        let mut numbers = IndexSet::new();
        numbers.extend(sighting.number);
        Self {
            area_id: sighting.area_id,
            numbers,
        }
    }

    fn merge(&mut self, sighting: StreetSighting) {
        self.numbers.extend(sighting.number);
    }
}

/// Map from natural key to accumulator, in first-seen key order.
#[derive(Debug, Clone)]
pub struct NaturalKeyMap<K, A> {
    entries: IndexMap<K, A>,
}

impl<K, A> NaturalKeyMap<K, A>
where
    K: std::hash::Hash + Eq,
    A: Accumulator,
{
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Record an observation. Returns `true` if the key was new.
    pub fn observe(&mut self, key: K, observation: A::Observation) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().merge(observation);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(A::start(observation));
                true
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&A> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &A)> {
        self.entries.iter()
    }
}

impl<K, A> Default for NaturalKeyMap<K, A>
where
    K: std::hash::Hash + Eq,
    A: Accumulator,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> IntoIterator for NaturalKeyMap<K, A> {
    type Item = (K, A);
    type IntoIter = indexmap::map::IntoIter<K, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
