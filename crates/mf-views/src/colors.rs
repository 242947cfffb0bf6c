//! Color and marker encoding of a field's values
//!
//! Discrete values get palette slots in the order the analyzer first saw
//! them. Continuous fields are cut into one equal-width bin per palette
//! color. Anything the index cannot place is drawn with [`UNKNOWN_COLOR`].

use chrono::{TimeZone, Utc};
use egui::Color32;
use indexmap::IndexSet;

use mf_core::{Feature, FieldValue};
use mf_data::analysis::{continuous_value, value_tokens};
use mf_data::{AnalyzerConfig, ContinuousKind, FieldAnalysis, FieldStat, FieldType, ValueRange};

/// Color for values the index cannot place
pub const UNKNOWN_COLOR: Color32 = Color32::from_rgb(160, 160, 160);

/// Default categorical palette
pub const DEFAULT_PALETTE: [Color32; 8] = [
    Color32::from_rgb(100, 150, 250), // Blue
    Color32::from_rgb(250, 150, 100), // Orange
    Color32::from_rgb(150, 250, 100), // Green
    Color32::from_rgb(250, 100, 150), // Pink
    Color32::from_rgb(150, 100, 250), // Purple
    Color32::from_rgb(250, 250, 100), // Yellow
    Color32::from_rgb(100, 250, 250), // Cyan
    Color32::from_rgb(250, 100, 100), // Red
];

/// Get a categorical color from the default palette
pub fn categorical_color(index: usize) -> Color32 {
    DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()]
}

/// Marker label for a palette slot: `A`..`Z`, then `AA`, `AB`, ...
pub fn marker_label(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// `#rrggbb` form of a color
pub fn color_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

/// Color index for one field of one analysis
#[derive(Debug, Clone, PartialEq)]
pub struct ColorIndex {
    field: Option<String>,
    palette: Vec<Color32>,
    /// Discrete values in slot order
    values: IndexSet<FieldValue>,
    /// Set for continuous fields
    bins: Option<ColorBins>,
    /// Formats the analyzer used to read dates
    date_formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct ColorBins {
    kind: ContinuousKind,
    range: ValueRange,
    date_formats: Vec<String>,
}

impl ColorBins {
    fn slot(&self, value: &FieldValue, count: usize) -> Option<usize> {
        let v = continuous_value(value, &self.date_formats)?;
        if !self.range.contains(v) {
            return None;
        }
        if self.range.span() <= 0.0 {
            return Some(0);
        }
        let bin = ((v - self.range.min) / self.range.span() * count as f64).floor() as usize;
        Some(bin.min(count - 1))
    }

    fn bounds(&self, slot: usize, count: usize) -> (f64, f64) {
        let width = self.range.span() / count as f64;
        let lo = self.range.min + width * slot as f64;
        (lo, lo + width)
    }

    fn format(&self, v: f64) -> String {
        match self.kind {
            ContinuousKind::Number => format!("{:.2}", v),
            ContinuousKind::Date => Utc
                .timestamp_millis_opt(v as i64)
                .single()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| format!("{}", v)),
        }
    }
}

/// One row of a color legend
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color32,
    pub marker: String,
}

/// Build the color index of `color_field` with the default palette and
/// analyzer settings
pub fn build_index(analysis: &FieldAnalysis, color_field: Option<&str>) -> ColorIndex {
    ColorIndex::build(analysis, color_field, &DEFAULT_PALETTE, &AnalyzerConfig::default())
}

impl ColorIndex {
    /// Index that places nothing
    pub fn empty() -> Self {
        Self {
            field: None,
            palette: DEFAULT_PALETTE.to_vec(),
            values: IndexSet::new(),
            bins: None,
            date_formats: Vec::new(),
        }
    }

    /// Build an index over `palette`, falling back to the default palette
    /// when it is empty.
    ///
    /// `config` must be the one `analysis` was made with, so date values are
    /// read the same way the analyzer read them.
    pub fn build(
        analysis: &FieldAnalysis,
        color_field: Option<&str>,
        palette: &[Color32],
        config: &AnalyzerConfig,
    ) -> Self {
        let mut index = Self::empty();
        if !palette.is_empty() {
            index.palette = palette.to_vec();
        }
        index.date_formats = config.date_formats.clone();

        let Some(field) = color_field else {
            return index;
        };
        index.field = Some(field.to_string());

        match analysis.get(field) {
            Some(stat) => index.absorb(stat),
            None => tracing::debug!("Color field '{}' is not in the analysis", field),
        }

        tracing::debug!(
            "Built color index for '{}': {} values, binned: {}",
            field,
            index.values.len(),
            index.bins.is_some()
        );
        index
    }

    fn absorb(&mut self, stat: &FieldStat) {
        match (stat.field_type, stat.range) {
            (FieldType::Continuous(kind), Some(range)) => {
                self.bins = Some(ColorBins {
                    kind,
                    range,
                    date_formats: self.date_formats.clone(),
                });
            }
            _ => {
                self.values.extend(stat.values.iter().cloned());
            }
        }
    }

    /// Add values that appeared in a newer analysis of the same field.
    ///
    /// Known discrete values keep their slots and new values take the next
    /// ones. Only discrete slots are stable: a continuous field takes the
    /// newer range, which re-bins and may recolor values already shown. If the
    /// field changed between discrete and continuous the index is rebuilt.
    pub fn extend(&mut self, analysis: &FieldAnalysis) {
        let Some(field) = self.field.clone() else {
            return;
        };
        let Some(stat) = analysis.get(&field) else {
            return;
        };
        if stat.field_type.is_continuous() != self.bins.is_some() {
            let mut rebuilt = Self::empty();
            rebuilt.palette = std::mem::take(&mut self.palette);
            rebuilt.date_formats = std::mem::take(&mut self.date_formats);
            rebuilt.field = Some(field);
            rebuilt.absorb(stat);
            *self = rebuilt;
            return;
        }
        let before = self.values.len();
        self.absorb(stat);
        tracing::debug!("Extended color index for '{}' by {} values", field, self.values.len() - before);
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn palette(&self) -> &[Color32] {
        &self.palette
    }

    /// Number of slots in use
    pub fn len(&self) -> usize {
        match &self.bins {
            Some(_) => self.palette.len(),
            None => self.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_none() && self.values.is_empty()
    }

    /// Slot of a value, if the index can place it
    pub fn slot(&self, value: &FieldValue) -> Option<usize> {
        match &self.bins {
            Some(bins) => bins.slot(value, self.palette.len()),
            None => self.values.get_index_of(value),
        }
    }

    fn slot_color(&self, slot: usize) -> Color32 {
        self.palette[slot % self.palette.len()]
    }

    /// Color of a value, [`UNKNOWN_COLOR`] if it has no slot
    pub fn lookup(&self, value: &FieldValue) -> Color32 {
        self.slot(value).map_or(UNKNOWN_COLOR, |slot| self.slot_color(slot))
    }

    /// Slot of a feature's value for the indexed field.
    ///
    /// Multi-valued values that have no slot as a whole are placed by their
    /// first element.
    pub fn feature_slot(&self, feature: &Feature) -> Option<usize> {
        let value = feature.value(self.field.as_deref()?);
        self.slot(value).or_else(|| {
            let first = value_tokens(value, true).into_iter().next()?;
            self.slot(&FieldValue::Text(first))
        })
    }

    pub fn color_for_feature(&self, feature: &Feature) -> Color32 {
        self.feature_slot(feature)
            .map_or(UNKNOWN_COLOR, |slot| self.slot_color(slot))
    }

    pub fn marker_for_feature(&self, feature: &Feature) -> Option<String> {
        self.feature_slot(feature).map(marker_label)
    }

    /// Legend rows in slot order
    pub fn legend(&self) -> Vec<LegendEntry> {
        let labels: Vec<String> = match &self.bins {
            Some(bins) if bins.range.span() <= 0.0 => vec![bins.format(bins.range.min)],
            Some(bins) => (0..self.palette.len())
                .map(|slot| {
                    let (lo, hi) = bins.bounds(slot, self.palette.len());
                    format!("{} to {}", bins.format(lo), bins.format(hi))
                })
                .collect(),
            None => self.values.iter().map(|v| v.to_string()).collect(),
        };

        labels
            .into_iter()
            .enumerate()
            .map(|(slot, label)| LegendEntry {
                label,
                color: self.slot_color(slot),
                marker: marker_label(slot),
            })
            .collect()
    }
}

impl Default for ColorIndex {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_data::analyze;

    fn happenings(values: &[&str]) -> Vec<Feature> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Feature::new(i.to_string()).with_property("happening", *v))
            .collect()
    }

    #[test]
    fn test_colors_follow_first_seen_order() {
        let analysis = analyze(&happenings(&["flood", "fire", "flood", "storm"]));
        let index = build_index(&analysis, Some("happening"));

        assert_eq!(index.lookup(&"flood".into()), DEFAULT_PALETTE[0]);
        assert_eq!(index.lookup(&"fire".into()), DEFAULT_PALETTE[1]);
        assert_eq!(index.lookup(&"storm".into()), DEFAULT_PALETTE[2]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_unknown_value_gets_fallback_color() {
        let analysis = analyze(&happenings(&["flood", "fire"]));
        let index = build_index(&analysis, Some("happening"));

        assert_eq!(index.lookup(&"earthquake".into()), UNKNOWN_COLOR);
        assert_eq!(index.lookup(&FieldValue::Null), UNKNOWN_COLOR);
    }

    #[test]
    fn test_missing_color_field_gives_empty_index() {
        let analysis = analyze(&happenings(&["flood"]));

        let index = build_index(&analysis, Some("nope"));
        assert!(index.is_empty());
        assert_eq!(index.lookup(&"flood".into()), UNKNOWN_COLOR);

        assert!(build_index(&analysis, None).is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let analysis = analyze(&happenings(&["flood", "fire", "storm"]));
        let first = build_index(&analysis, Some("happening"));
        let _other = build_index(&analysis, None);
        let second = build_index(&analysis, Some("happening"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_palette_cycles_when_values_outnumber_colors() {
        let values: Vec<String> = (0..10).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let analysis = analyze(&happenings(&refs));
        let index = build_index(&analysis, Some("happening"));

        assert_eq!(index.lookup(&"v8".into()), index.lookup(&"v0".into()));
        assert_eq!(index.lookup(&"v9".into()), DEFAULT_PALETTE[1]);
    }

    #[test]
    fn test_extend_keeps_existing_colors() {
        let mut index = build_index(&analyze(&happenings(&["fire", "flood"])), Some("happening"));
        let newer = analyze(&happenings(&["storm", "flood", "fire"]));

        index.extend(&newer);

        assert_eq!(index.lookup(&"fire".into()), DEFAULT_PALETTE[0]);
        assert_eq!(index.lookup(&"flood".into()), DEFAULT_PALETTE[1]);
        assert_eq!(index.lookup(&"storm".into()), DEFAULT_PALETTE[2]);
    }

    #[test]
    fn test_continuous_values_are_binned() {
        let features: Vec<Feature> = [0.0, 5.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, v)| Feature::new(i.to_string()).with_property("today", *v))
            .collect();
        let index = build_index(&analyze(&features), Some("today"));

        assert_eq!(index.lookup(&FieldValue::from(0.0)), DEFAULT_PALETTE[0]);
        assert_eq!(index.lookup(&FieldValue::from(10.0)), DEFAULT_PALETTE[7]);
        assert_eq!(index.slot(&FieldValue::from(5.0)), Some(4));
        assert_eq!(index.lookup(&FieldValue::from(11.0)), UNKNOWN_COLOR);
        assert_eq!(index.legend().len(), 8);
        assert_eq!(index.legend()[0].label, "0.00 to 1.25");
    }

    #[test]
    fn test_dates_are_binned_with_analyzer_formats() {
        let config = AnalyzerConfig {
            date_formats: vec!["%m/%d/%Y".to_string()],
            ..Default::default()
        };
        let features = vec![
            Feature::new("1").with_property("when", "03/01/2017"),
            Feature::new("2").with_property("when", "03/20/2017"),
        ];
        let analysis = mf_data::FieldAnalyzer::with_config(config.clone()).analyze(&features);
        assert_eq!(
            analysis.get("when").map(|s| s.field_type),
            Some(FieldType::Continuous(ContinuousKind::Date))
        );

        let index = ColorIndex::build(&analysis, Some("when"), &DEFAULT_PALETTE, &config);
        assert_eq!(index.color_for_feature(&features[0]), DEFAULT_PALETTE[0]);
        assert_eq!(index.color_for_feature(&features[1]), DEFAULT_PALETTE[7]);
        assert_eq!(index.legend()[0].label, "2017-03-01 to 2017-03-03");
    }

    #[test]
    fn test_extend_rebins_continuous_fields() {
        let today = |values: &[f64]| -> Vec<Feature> {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Feature::new(i.to_string()).with_property("today", *v))
                .collect()
        };
        let mut index = build_index(&analyze(&today(&[0.0, 8.0])), Some("today"));
        assert_eq!(index.slot(&FieldValue::from(4.0)), Some(4));

        index.extend(&analyze(&today(&[0.0, 16.0])));
        assert_eq!(index.slot(&FieldValue::from(4.0)), Some(2));
        assert_eq!(index.slot(&FieldValue::from(16.0)), Some(7));
    }

    #[test]
    fn test_feature_color_uses_first_list_element() {
        let features = vec![
            Feature::new("1").with_property("tags", vec!["rain", "river"]),
            Feature::new("2").with_property("tags", vec!["snow"]),
        ];
        let index = build_index(&analyze(&features), Some("tags"));

        let sample = Feature::new("x").with_property("tags", vec!["snow", "rain"]);
        assert_eq!(index.color_for_feature(&sample), index.lookup(&"snow".into()));
        assert_eq!(index.marker_for_feature(&sample).as_deref(), Some("C"));
        assert_eq!(index.color_for_feature(&Feature::new("y")), UNKNOWN_COLOR);
    }

    #[test]
    fn test_marker_labels() {
        assert_eq!(marker_label(0), "A");
        assert_eq!(marker_label(25), "Z");
        assert_eq!(marker_label(26), "AA");
        assert_eq!(marker_label(27), "AB");
        assert_eq!(marker_label(701), "ZZ");
        assert_eq!(marker_label(702), "AAA");
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(color_hex(DEFAULT_PALETTE[0]), "#6496fa");
        assert_eq!(categorical_color(8), DEFAULT_PALETTE[0]);
    }
}
