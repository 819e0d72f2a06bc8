use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};
use serde::Serialize;

use crate::data::model::Value;

/// Colour for values that are not in the legend (e.g. absent labels).
pub const DEFAULT_COLOR: &str = "#808080";

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues,
/// as `#rrggbb` strings.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            format!(
                "#{:02x}{:02x}{:02x}",
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color legend: category value → colour
// ---------------------------------------------------------------------------

/// Maps the observed values of the column bound to a `category` role to
/// distinct colours, so the renderer and any legend agree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorLegend {
    pub column: String,
    #[serde(serialize_with = "entries_as_list")]
    mapping: BTreeMap<Value, String>,
}

#[derive(Serialize)]
struct LegendEntry<'a> {
    label: String,
    color: &'a str,
}

fn entries_as_list<S: serde::Serializer>(
    mapping: &BTreeMap<Value, String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(mapping.iter().map(|(v, c)| LegendEntry {
        label: v.to_string(),
        color: c,
    }))
}

impl ColorLegend {
    /// Build a legend for the given column from its unique values.
    pub fn new(column: &str, unique_values: &BTreeSet<Value>) -> Self {
        let palette = generate_palette(unique_values.len());
        let mapping = unique_values.iter().cloned().zip(palette).collect();
        ColorLegend {
            column: column.to_string(),
            mapping,
        }
    }

    /// Look up the colour for a given value.
    pub fn color_for(&self, value: &Value) -> &str {
        self.mapping
            .get(value)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Return the legend entries (value label → colour).
    pub fn entries(&self) -> Vec<(String, &str)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), c.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
