use crate::error::DocumentError;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DocumentContent {
    current: String,
    // None until the first successful seed; a loading document is never dirty.
    baseline: Option<String>,
}

/// Live and last-persisted content for every open document.
///
/// Mutations on ids that were never reserved, or that are still loading,
/// fail with a [`DocumentError`]. Queries on such ids answer `None`/`false`.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    documents: HashMap<String, DocumentContent>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loading entry for `id`. Existing entries are left alone.
    pub fn reserve(&mut self, id: &str) {
        self.documents.entry(id.to_string()).or_default();
    }

    /// Initializes both fields from fetched content. Once a baseline exists this
    /// is a no-op, so a slow fetch can never clobber edits made in the meantime.
    /// Returns whether the content was applied.
    pub fn seed(&mut self, id: &str, content: &str) -> bool {
        let entry = self.documents.entry(id.to_string()).or_default();
        if entry.baseline.is_some() {
            return false;
        }
        entry.current = content.to_string();
        entry.baseline = Some(content.to_string());
        true
    }

    pub fn set_current(&mut self, id: &str, content: &str) -> Result<(), DocumentError> {
        let entry = self.loaded_mut(id)?;
        entry.current = content.to_string();
        Ok(())
    }

    /// `baseline := current`, after a successful save or an approved agent write.
    pub fn commit(&mut self, id: &str) -> Result<(), DocumentError> {
        let entry = self.loaded_mut(id)?;
        entry.baseline = Some(entry.current.clone());
        Ok(())
    }

    /// `current := baseline`, discarding everything since the last commit.
    pub fn revert(&mut self, id: &str) -> Result<(), DocumentError> {
        let entry = self.loaded_mut(id)?;
        if let Some(baseline) = &entry.baseline {
            entry.current = baseline.clone();
        }
        Ok(())
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.documents
            .get(id)
            .and_then(|doc| doc.baseline.as_ref().map(|baseline| *baseline != doc.current))
            .unwrap_or(false)
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.documents
            .get(id)
            .is_some_and(|doc| doc.baseline.is_some())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Live content; `None` for unknown or still-loading documents.
    pub fn current(&self, id: &str) -> Option<&str> {
        self.documents
            .get(id)
            .filter(|doc| doc.baseline.is_some())
            .map(|doc| doc.current.as_str())
    }

    pub fn baseline(&self, id: &str) -> Option<&str> {
        self.documents.get(id).and_then(|doc| doc.baseline.as_deref())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.documents.remove(id).is_some()
    }

    /// Moves the entry for `old_id` to `new_id`. Fails without mutating when
    /// `old_id` is unknown or `new_id` is taken.
    pub fn rename(&mut self, old_id: &str, new_id: &str) -> Result<(), DocumentError> {
        if old_id == new_id {
            return if self.documents.contains_key(old_id) {
                Ok(())
            } else {
                Err(DocumentError::UnknownDocument(old_id.to_string()))
            };
        }
        if self.documents.contains_key(new_id) {
            return Err(DocumentError::AlreadyExists(new_id.to_string()));
        }
        let entry = self
            .documents
            .remove(old_id)
            .ok_or_else(|| DocumentError::UnknownDocument(old_id.to_string()))?;
        self.documents.insert(new_id.to_string(), entry);
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn loaded_mut(&mut self, id: &str) -> Result<&mut DocumentContent, DocumentError> {
        match self.documents.get_mut(id) {
            Some(doc) if doc.baseline.is_some() => Ok(doc),
            Some(_) => Err(DocumentError::NotLoaded(id.to_string())),
            None => Err(DocumentError::UnknownDocument(id.to_string())),
        }
    }
}
