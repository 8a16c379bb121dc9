//! In-memory preset collection
//!
//! Ordered by insertion. No I/O happens here; callers schedule persistence
//! after mutating.

use uuid::Uuid;

use crate::types::Preset;

#[derive(Debug, Default, Clone)]
pub struct PresetStore {
    presets: Vec<Preset>,
    current: Option<Uuid>,
}

impl PresetStore {
    pub fn new(presets: Vec<Preset>) -> Self {
        Self { presets, current: None }
    }

    pub fn add(&mut self, preset: Preset) {
        self.presets.push(preset);
    }

    /// Replace the preset with the same id. Returns false (and does nothing)
    /// when the id is unknown.
    pub fn update(&mut self, preset: Preset) -> bool {
        match self.presets.iter_mut().find(|p| p.id == preset.id) {
            Some(slot) => {
                *slot = preset;
                true
            }
            None => false,
        }
    }

    /// Remove by id, clearing the current preset if it was the one removed.
    /// Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: Uuid) -> Option<Preset> {
        let idx = self.presets.iter().position(|p| p.id == id)?;
        if self.current == Some(id) {
            self.current = None;
        }
        Some(self.presets.remove(idx))
    }

    pub fn find(&self, id: Uuid) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Preset> {
        self.presets.iter_mut().find(|p| p.id == id)
    }

    /// First preset whose name matches case-insensitively
    pub fn find_by_name(&self, name: &str) -> Option<&Preset> {
        let name = name.trim();
        self.presets.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Snapshot of the collection in display order
    pub fn list(&self) -> Vec<Preset> {
        self.presets.clone()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn current(&self) -> Option<&Preset> {
        self.current.and_then(|id| self.find(id))
    }

    pub fn current_id(&self) -> Option<Uuid> {
        self.current
    }

    /// Point the current preset at `id`. Unknown ids leave it unset.
    pub fn set_current(&mut self, id: Uuid) -> bool {
        if self.find(id).is_some() {
            self.current = Some(id);
            true
        } else {
            self.current = None;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppEntry;

    fn preset(name: &str) -> Preset {
        Preset::new(name, "", vec![AppEntry::new("Terminal")], true)
    }

    #[test]
    fn test_add_then_find_returns_equal_preset() {
        let mut store = PresetStore::default();
        let p = preset("Work");
        store.add(p.clone());
        assert_eq!(store.find(p.id), Some(&p));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = PresetStore::default();
        let p = preset("Work");
        store.add(p.clone());

        assert!(store.remove(p.id).is_some());
        assert!(store.remove(p.id).is_none());
        assert!(store.remove(Uuid::new_v4()).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_remove_current_clears_current() {
        let mut store = PresetStore::default();
        let a = preset("A");
        let b = preset("B");
        store.add(a.clone());
        store.add(b.clone());
        store.set_current(a.id);

        store.remove(b.id);
        assert_eq!(store.current_id(), Some(a.id));

        store.remove(a.id);
        assert_eq!(store.current_id(), None);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut store = PresetStore::default();
        let a = preset("A");
        store.add(a.clone());

        assert!(!store.update(preset("Stranger")));
        assert_eq!(store.list(), vec![a]);
    }

    #[test]
    fn test_update_keeps_position() {
        let mut store = PresetStore::default();
        let a = preset("A");
        let b = preset("B");
        store.add(a.clone());
        store.add(b.clone());

        let mut renamed = a.clone();
        renamed.name = "A2".into();
        assert!(store.update(renamed));

        let names: Vec<_> = store.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A2", "B"]);
    }

    #[test]
    fn test_duplicate_names_allowed() {
        let mut store = PresetStore::default();
        store.add(preset("Same"));
        store.add(preset("Same"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_name("same").map(|p| p.id), store.list().first().map(|p| p.id));
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let mut store = PresetStore::default();
        store.add(preset("A"));
        let snapshot = store.list();
        store.add(preset("B"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_set_current_unknown_id() {
        let mut store = PresetStore::default();
        assert!(!store.set_current(Uuid::new_v4()));
        assert!(store.current().is_none());
    }
}
