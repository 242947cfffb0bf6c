//! Media grid model

use serde::{Deserialize, Serialize};

use mf_core::{Feature, FeatureId};
use mf_data::analysis::value_tokens;

use crate::field_mapping::{is_image_url, FieldMapping};

/// Default thumbnail edge in pixels
pub const DEFAULT_THUMB_SIZE: f32 = 200.0;

/// An image attached to a feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub feature_id: FeatureId,
    pub url: String,
}

/// Images of the mapped media field, in feature order.
///
/// Multi-valued media fields contribute one item per image URL.
pub fn media_items(features: &[Feature], mapping: &FieldMapping) -> Vec<MediaItem> {
    let Some(key) = mapping.media.as_deref() else {
        return Vec::new();
    };

    features
        .iter()
        .flat_map(|feature| {
            value_tokens(feature.value(key), false)
                .into_iter()
                .map(|url| url.trim().to_string())
                .filter(|url| is_image_url(&url.as_str().into()))
                .map(|url| MediaItem {
                    feature_id: feature.id.clone(),
                    url,
                })
        })
        .collect()
}

/// Cell layout of a square-thumbnail grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
    pub cell_size: f32,
}

impl GridLayout {
    /// Lay out `count` thumbnails in a `width` x `height` viewport.
    ///
    /// Cells stretch to fill the width. When the rows overflow the height,
    /// cells shrink so a vertical scrollbar of `scrollbar_width` fits.
    pub fn compute(count: usize, width: f32, height: f32, thumb_size: f32, scrollbar_width: f32) -> Self {
        let columns = if thumb_size > 0.0 {
            ((width / thumb_size).floor() as usize).max(1)
        } else {
            1
        };
        let rows = count.div_ceil(columns);
        let mut cell_size = width.max(0.0) / columns as f32;
        if cell_size * rows as f32 > height && scrollbar_width > 0.0 {
            cell_size = (width - scrollbar_width).max(0.0) / columns as f32;
        }
        Self { columns, rows, cell_size }
    }

    /// Item index shown in a cell, if any
    pub fn item_at(&self, row: usize, column: usize, count: usize) -> Option<usize> {
        let index = row * self.columns + column;
        (column < self.columns && index < count).then_some(index)
    }
}

/// Stored size variant of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSize {
    Thumbnail,
    Preview,
    Original,
}

impl MediaSize {
    /// Smallest variant that looks sharp at `width` CSS pixels
    pub fn for_width(width: f32, pixel_ratio: f32) -> Self {
        if width < 300.0 * pixel_ratio {
            MediaSize::Thumbnail
        } else if width < 1200.0 * pixel_ratio {
            MediaSize::Preview
        } else {
            MediaSize::Original
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaSize::Thumbnail => "thumbnail",
            MediaSize::Preview => "preview",
            MediaSize::Original => "original",
        }
    }
}

/// URL of a media attachment: `{base}/media/{size}/{id}`
pub fn media_url(base: &str, size: MediaSize, id: &str) -> String {
    format!("{}/media/{}/{}", base.trim_end_matches('/'), size.as_str(), id)
}
