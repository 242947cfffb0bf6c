//! Per-view state: hidden fields and the selected feature
//!
//! A [`ViewState`] is a plain value. Every operation takes the current state
//! and returns the next one, so a transition is applied completely or not at
//! all and older states stay valid for whoever still holds them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::feature::FeatureId;

/// Last bulk visibility action taken in a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkAction {
    ShowAll,
    HideAll,
}

/// One row of the hide-fields menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub field_key: String,
    pub hidden: bool,
}

/// Hidden fields and selection for a single view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Known fields in discovery order, mapped to their hidden flag
    fields: IndexMap<String, bool>,

    last_bulk: Option<BulkAction>,

    selected: Option<FeatureId>,
}

impl ViewState {
    /// Create an empty view state
    pub fn new() -> Self {
        Self::default()
    }

    /// Register fields that this view has not seen yet.
    ///
    /// New fields start hidden only when the last bulk action was
    /// [`ViewState::hide_all`]; otherwise they start visible. Fields that are
    /// already known keep their flag.
    pub fn with_known_fields<I, S>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        let default_hidden = self.default_hidden();
        for key in keys {
            let key = key.as_ref();
            if !next.fields.contains_key(key) {
                next.fields.insert(key.to_string(), default_hidden);
            }
        }
        next
    }

    /// Flip the hidden flag of one field
    pub fn toggle_field_visibility(&self, key: &str) -> Self {
        let hidden = self.is_hidden(key);
        self.set_field_hidden(key, !hidden)
    }

    /// Set the hidden flag of one field
    pub fn set_field_hidden(&self, key: &str, hidden: bool) -> Self {
        let mut next = self.clone();
        next.fields.insert(key.to_string(), hidden);
        next
    }

    /// Make every known field visible
    pub fn show_all(&self) -> Self {
        self.bulk(BulkAction::ShowAll)
    }

    /// Hide every known field
    pub fn hide_all(&self) -> Self {
        self.bulk(BulkAction::HideAll)
    }

    fn bulk(&self, action: BulkAction) -> Self {
        let hidden = action == BulkAction::HideAll;
        let mut next = self.clone();
        for flag in next.fields.values_mut() {
            *flag = hidden;
        }
        next.last_bulk = Some(action);
        next
    }

    /// Select a feature. The id is not checked against any collection.
    pub fn select_feature(&self, id: impl Into<FeatureId>) -> Self {
        Self {
            selected: Some(id.into()),
            ..self.clone()
        }
    }

    pub fn clear_selection(&self) -> Self {
        Self {
            selected: None,
            ..self.clone()
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn last_bulk_action(&self) -> Option<BulkAction> {
        self.last_bulk
    }

    /// Hidden flag a field gets when it is first discovered
    pub fn default_hidden(&self) -> bool {
        self.last_bulk == Some(BulkAction::HideAll)
    }

    /// Whether a field is hidden. Unknown fields report the discovery default.
    pub fn is_hidden(&self, key: &str) -> bool {
        self.fields
            .get(key)
            .copied()
            .unwrap_or_else(|| self.default_hidden())
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn hidden_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, hidden)| **hidden)
            .map(|(key, _)| key.as_str())
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, hidden)| !**hidden)
            .map(|(key, _)| key.as_str())
    }

    pub fn hidden_count(&self) -> usize {
        self.fields.values().filter(|hidden| **hidden).count()
    }

    /// Rows for a hide-fields menu, in discovery order
    pub fn field_rows(&self) -> Vec<FieldRow> {
        self.fields
            .iter()
            .map(|(key, hidden)| FieldRow {
                field_key: key.clone(),
                hidden: *hidden,
            })
            .collect()
    }

    /// Toolbar label for the hide-fields button
    pub fn hidden_fields_label(&self) -> String {
        match self.hidden_count() {
            0 => "Hide Fields".to_string(),
            1 => "1 Hidden Field".to_string(),
            n => format!("{n} Hidden Fields"),
        }
    }
}
