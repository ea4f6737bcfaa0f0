//! Registry: HiddenSet + CategoryIndex, the vanish state machine.
//!
//! Every filename the overlay has ever observed is in exactly one of two
//! camps: hidden (awaiting a classifier verdict) or bound to a category.
//! The root listing and the synthetic category directories are both derived
//! from this structure. All methods expect the caller to hold the state
//! lock; nothing in here performs I/O.
//!
//! Each observation stamps the name with a generation drawn from a
//! registry-wide counter. Verdicts carry the generation they were enqueued
//! under, so a verdict for bytes that have since been unlinked or
//! overwritten can never bind the name's current incarnation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::SystemTime;

/// Bookkeeping for a file the overlay has observed at the root.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub filename: String,
    pub size: u64,
    pub created_at: SystemTime,
    pub processing: bool,
    /// Which observation of this name the record describes.
    pub generation: u64,
}

impl FileRecord {
    fn new(filename: &str, generation: u64) -> Self {
        Self {
            filename: filename.to_string(),
            size: 0,
            created_at: SystemTime::now(),
            processing: false,
            generation,
        }
    }
}

/// Outcome of attempting to remove a category directory.
#[derive(Debug, PartialEq, Eq)]
pub enum CategoryRemoval {
    Removed,
    NotEmpty,
    NotFound,
}

#[derive(Debug, Default)]
pub struct Registry {
    /// Filenames suppressed from the root listing, awaiting classification.
    hidden: HashSet<String>,
    /// Category -> filenames, in name order for stable listings.
    categories: BTreeMap<String, Vec<String>>,
    /// Filename -> category, the reverse binding.
    file_category: HashMap<String, String>,
    /// Filename -> bookkeeping record.
    records: HashMap<String, FileRecord>,
    /// Never reused, so a recreated name always outranks its past.
    next_generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown -> Observed: hide the name until the classifier speaks.
    /// Returns the generation stamped on this observation.
    ///
    /// Re-creating an already-categorized basename counts as a fresh
    /// observation: the old binding is dropped first, so the name is never
    /// hidden and categorized at the same time, and any verdict still in
    /// flight for the old bytes dies on its stale generation.
    pub fn observe(&mut self, name: &str) -> u64 {
        if let Some(category) = self.file_category.remove(name) {
            if let Some(files) = self.categories.get_mut(&category) {
                files.retain(|f| f != name);
            }
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.hidden.insert(name.to_string());
        self.records
            .insert(name.to_string(), FileRecord::new(name, generation));
        self.assert_invariants();
        generation
    }

    /// Generation of the name's current incarnation, if it is known.
    pub fn generation_of(&self, name: &str) -> Option<u64> {
        self.records.get(name).map(|r| r.generation)
    }

    /// InFlight -> Categorized. Returns false (and changes nothing) unless
    /// the name is still hidden and still the same incarnation the verdict
    /// was enqueued for — unlinked or recreated names drop their stale
    /// verdicts here.
    pub fn categorize(&mut self, name: &str, category: &str, generation: u64) -> bool {
        match self.records.get(name) {
            Some(record) if record.generation == generation => {}
            _ => return false,
        }
        if !self.hidden.remove(name) {
            return false;
        }

        let files = self.categories.entry(category.to_string()).or_default();
        if !files.iter().any(|f| f == name) {
            files.push(name.to_string());
        }
        self.file_category.insert(name.to_string(), category.to_string());

        if let Some(record) = self.records.get_mut(name) {
            record.processing = false;
        }
        self.assert_invariants();
        true
    }

    /// InFlight -> Rejected: the name stays hidden; a later `release` on it
    /// is the only way back into the queue. A rejection for a superseded
    /// generation is ignored.
    pub fn reject(&mut self, name: &str, generation: u64) {
        if let Some(record) = self.records.get_mut(name) {
            if record.generation == generation {
                record.processing = false;
            }
        }
    }

    /// Drop every trace of a name (unlink, rename source, rename target).
    pub fn forget(&mut self, name: &str) {
        self.hidden.remove(name);
        if let Some(category) = self.file_category.remove(name) {
            if let Some(files) = self.categories.get_mut(&category) {
                files.retain(|f| f != name);
            }
        }
        self.records.remove(name);
        self.assert_invariants();
    }

    pub fn mark_processing(&mut self, name: &str, processing: bool) {
        if let Some(record) = self.records.get_mut(name) {
            record.processing = processing;
        }
    }

    pub fn note_size(&mut self, name: &str, size: u64) {
        if let Some(record) = self.records.get_mut(name) {
            record.size = size;
        }
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.file_category.get(name).map(String::as_str)
    }

    pub fn is_categorized(&self, name: &str) -> bool {
        self.file_category.contains_key(name)
    }

    /// Does this name exist as a category in the index (empty or not)?
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Category names the root listing shows: only those with members.
    pub fn nonempty_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The filename sequence bound to a category, if the category exists.
    pub fn files_in(&self, category: &str) -> Option<Vec<String>> {
        self.categories.get(category).cloned()
    }

    /// Root visibility policy for a real backing entry: hidden and
    /// categorized names are suppressed, everything else shows through.
    pub fn visible_in_root(&self, name: &str) -> bool {
        !self.hidden.contains(name) && !self.file_category.contains_key(name)
    }

    /// rmdir on a synthetic directory: only an empty category may go.
    pub fn remove_category(&mut self, category: &str) -> CategoryRemoval {
        match self.categories.get(category) {
            None => CategoryRemoval::NotFound,
            Some(files) if !files.is_empty() => CategoryRemoval::NotEmpty,
            Some(_) => {
                self.categories.remove(category);
                CategoryRemoval::Removed
            }
        }
    }

    pub fn record(&self, name: &str) -> Option<&FileRecord> {
        self.records.get(name)
    }

    // Invariant: a known name is hidden XOR categorized, and appears in at
    // most one category sequence.
    fn assert_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            for name in &self.hidden {
                debug_assert!(
                    !self.file_category.contains_key(name),
                    "{name} both hidden and categorized"
                );
            }
            for (name, category) in &self.file_category {
                let occurrences = self
                    .categories
                    .values()
                    .flatten()
                    .filter(|f| *f == name)
                    .count();
                debug_assert!(
                    occurrences == 1,
                    "{name} appears in {occurrences} category sequences (bound to {category})"
                );
            }
        }
    }
}
