//! Which fields feed the parts of a feature card

use serde::{Deserialize, Serialize};

use mf_core::FieldValue;
use mf_data::{ContinuousKind, FieldAnalysis, FieldType};

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Field keys used for the title, subtitle, color and media of a card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub color: Option<String>,
    pub media: Option<String>,
}

impl FieldMapping {
    /// Guess a mapping from an analysis.
    ///
    /// The title is the first discrete field, the subtitle the first date
    /// field, and media the first field holding image URLs.
    pub fn guess(analysis: &FieldAnalysis, color_field: Option<&str>) -> Self {
        let media = analysis
            .iter()
            .find(|(_, stat)| stat.values.iter().any(is_image_url))
            .map(|(key, _)| key.to_string());

        let title = analysis
            .iter()
            .find(|(key, stat)| {
                stat.field_type == FieldType::Discrete && media.as_deref() != Some(*key)
            })
            .map(|(key, _)| key.to_string());

        let subtitle = analysis
            .iter()
            .find(|(_, stat)| stat.field_type == FieldType::Continuous(ContinuousKind::Date))
            .map(|(key, _)| key.to_string());

        let mapping = Self {
            title,
            subtitle,
            color: color_field.map(str::to_string),
            media,
        };
        tracing::debug!("Guessed field mapping: {:?}", mapping);
        mapping
    }

    /// Keep explicitly set fields, fill the rest from `defaults`
    pub fn or(self, defaults: FieldMapping) -> Self {
        Self {
            title: self.title.or(defaults.title),
            subtitle: self.subtitle.or(defaults.subtitle),
            color: self.color.or(defaults.color),
            media: self.media.or(defaults.media),
        }
    }
}

/// Whether a value looks like a link to an image
pub fn is_image_url(value: &FieldValue) -> bool {
    let Some(text) = value.as_text() else {
        return false;
    };
    let lower = text.trim().to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    (lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with('/'))
        && IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
