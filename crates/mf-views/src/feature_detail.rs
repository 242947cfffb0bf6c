//! Detail card model for a single feature

use egui::Color32;

use mf_core::{Feature, FeatureId, FieldValue, ViewState};
use mf_data::{FieldAnalysis, FieldType};

use crate::colors::ColorIndex;
use crate::field_mapping::FieldMapping;

/// A mapped card field with the type the analyzer gave it
#[derive(Debug, Clone, PartialEq)]
pub struct DetailField {
    pub key: String,
    pub value: FieldValue,
    pub field_type: Option<FieldType>,
}

/// One property row of the card table
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub key: String,
    pub value: FieldValue,
    pub field_type: Option<FieldType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDetail {
    pub id: FeatureId,
    pub color: Color32,
    pub marker: Option<String>,
    pub title: Option<DetailField>,
    pub subtitle: Option<DetailField>,
    pub media: Option<String>,
    /// Visible properties in feature order
    pub rows: Vec<DetailRow>,
    pub hidden_count: usize,
}

impl FeatureDetail {
    pub fn build(
        feature: &Feature,
        analysis: &FieldAnalysis,
        colors: &ColorIndex,
        mapping: &FieldMapping,
        view: &ViewState,
    ) -> Self {
        let mapped = |key: &Option<String>| -> Option<DetailField> {
            let key = key.as_deref()?;
            let value = feature.get(key).filter(|v| !v.is_null())?;
            Some(DetailField {
                key: key.to_string(),
                value: value.clone(),
                field_type: analysis.field_type(key),
            })
        };

        let media = mapping
            .media
            .as_deref()
            .and_then(|key| feature.value(key).as_text())
            .map(|url| url.trim().to_string());

        let (rows, hidden): (Vec<_>, Vec<_>) = feature
            .properties
            .iter()
            .partition(|(key, _)| !view.is_hidden(key));

        Self {
            id: feature.id.clone(),
            color: colors.color_for_feature(feature),
            marker: colors.marker_for_feature(feature),
            title: mapped(&mapping.title),
            subtitle: mapped(&mapping.subtitle),
            media,
            rows: rows
                .into_iter()
                .map(|(key, value)| DetailRow {
                    key: key.clone(),
                    value: value.clone(),
                    field_type: analysis.field_type(key),
                })
                .collect(),
            hidden_count: hidden.len(),
        }
    }
}
