use std::sync::Arc;
use parking_lot::RwLock;
use ahash::AHashMap;
use uuid::Uuid;

use crate::state::ViewState;

/// View identifier type
pub type ViewId = Uuid;

/// Registry of view-local state for every open view.
///
/// Each view owns an independent [`ViewState`]; the registry only hands out
/// copies and swaps in the result of a transition, so one view's actions
/// never leak into another.
pub struct ViewRegistry {
    views: Arc<RwLock<AHashMap<ViewId, ViewState>>>,
}

impl ViewRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            views: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Open a new view with fresh state
    pub fn register_view(&self) -> ViewId {
        let id = Uuid::new_v4();
        self.register_view_with(id, ViewState::new());
        id
    }

    /// Open a view with a caller-provided id and initial state
    pub fn register_view_with(&self, id: ViewId, state: ViewState) {
        tracing::debug!("Registering view {}", id);
        self.views.write().insert(id, state);
    }

    /// Close a view, discarding its state
    pub fn unregister_view(&self, id: ViewId) -> Option<ViewState> {
        tracing::debug!("Unregistering view {}", id);
        self.views.write().remove(&id)
    }

    /// Current state of a view
    pub fn state(&self, id: ViewId) -> Option<ViewState> {
        self.views.read().get(&id).cloned()
    }

    /// Apply a transition to one view and return the new state.
    ///
    /// Returns `None` if the view is not registered.
    pub fn update<F>(&self, id: ViewId, transition: F) -> Option<ViewState>
    where
        F: FnOnce(&ViewState) -> ViewState,
    {
        let mut views = self.views.write();
        let current = views.get_mut(&id)?;
        let next = transition(current);
        *current = next.clone();
        Some(next)
    }

    /// Make newly loaded fields known to every open view
    pub fn sync_known_fields<S: AsRef<str>>(&self, keys: &[S]) {
        let mut views = self.views.write();
        for state in views.values_mut() {
            *state = state.with_known_fields(keys.iter().map(|k| k.as_ref()));
        }
    }

    /// Number of open views
    pub fn view_count(&self) -> usize {
        self.views.read().len()
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_are_independent() {
        let registry = ViewRegistry::new();
        let map_view = registry.register_view();
        let report_view = registry.register_view();
        registry.sync_known_fields(&["happening", "today"]);

        registry.update(map_view, |s| s.hide_all());
        registry.update(report_view, |s| s.select_feature("f1"));

        let map_state = registry.state(map_view).unwrap();
        let report_state = registry.state(report_view).unwrap();
        assert_eq!(map_state.hidden_count(), 2);
        assert_eq!(map_state.selected(), None);
        assert_eq!(report_state.hidden_count(), 0);
        assert_eq!(report_state.selected(), Some("f1"));
    }

    #[test]
    fn test_sync_respects_bulk_action_per_view() {
        let registry = ViewRegistry::new();
        let a = registry.register_view();
        let b = registry.register_view();
        registry.update(a, |s| s.hide_all());

        registry.sync_known_fields(&["newField"]);

        assert!(registry.state(a).unwrap().is_hidden("newField"));
        assert!(!registry.state(b).unwrap().is_hidden("newField"));
    }

    #[test]
    fn test_unregister_discards_state() {
        let registry = ViewRegistry::new();
        let id = registry.register_view();
        assert_eq!(registry.view_count(), 1);

        assert!(registry.unregister_view(id).is_some());
        assert!(registry.state(id).is_none());
        assert!(registry.update(id, |s| s.show_all()).is_none());
        assert_eq!(registry.view_count(), 0);
    }
}
