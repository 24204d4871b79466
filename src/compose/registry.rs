//! Name-keyed entity registries

use crate::error::{EntityKind, Result, StackError};
use indexmap::map::Entry;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("valid name regex"));

/// Validate an entity name
pub fn validate_name(kind: EntityKind, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StackError::missing(format!("{} definition", kind), "name"));
    }
    if !NAME_RE.is_match(name) {
        return Err(StackError::shape(
            format!("{} name", kind),
            format!(
                "'{}' must start with a letter or digit and contain only letters, digits, '_', '.' or '-'",
                name
            ),
        ));
    }
    Ok(())
}

/// An entity with an immutable, registry-unique name
pub trait Named {
    const KIND: EntityKind;

    fn name(&self) -> &str;
}

/// Insertion-ordered map from unique name to entity
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: IndexMap<String, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T: Named> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `name` is free without inserting anything
    pub fn ensure_vacant(&self, name: &str) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(StackError::duplicate(T::KIND, name));
        }
        Ok(())
    }

    /// Insert a new entity; a taken name is an error
    pub fn insert(&mut self, entity: T) -> Result<&T> {
        match self.entries.entry(entity.name().to_string()) {
            Entry::Occupied(entry) => Err(StackError::duplicate(T::KIND, entry.key().as_str())),
            Entry::Vacant(entry) => Ok(&*entry.insert(entity)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.get_mut(name)
    }

    /// Replace an existing entity with an edited copy of itself
    pub(crate) fn replace(&mut self, entity: T) -> Result<()> {
        match self.entries.get_mut(entity.name()) {
            Some(slot) => {
                *slot = entity;
                Ok(())
            }
            None => Err(StackError::State(format!(
                "{} '{}' is not registered",
                T::KIND,
                entity.name()
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
