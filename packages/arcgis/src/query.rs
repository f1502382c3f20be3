//! `FeatureServer` / `MapServer` layer queries and metadata.
//!
//! Queries are sent with `f=json` so geometry comes back as Esri JSON and
//! is converted with [`crate::geometry`]. Layer metadata (`<layer>?f=json`)
//! supplies the field schema, including coded-value domains.

use std::collections::BTreeMap;

use geo::Geometry;
use serde_json::{Map, Value};

use crate::{GisClient, LookupError, geometry};

/// Default number of features requested per query.
pub const DEFAULT_RECORD_COUNT: u32 = 10;

/// A single layer query.
#[derive(Debug, Clone)]
pub struct LayerQuery {
    where_clause: String,
    return_geometry: bool,
    geometry: Option<(Value, &'static str)>,
    record_count: u32,
}

impl LayerQuery {
    /// An attribute query with the given `where` clause.
    #[must_use]
    pub fn attribute(where_clause: &str) -> Self {
        Self {
            where_clause: where_clause.to_string(),
            return_geometry: false,
            geometry: None,
            record_count: DEFAULT_RECORD_COUNT,
        }
    }

    /// A spatial query for features intersecting `geometry`.
    ///
    /// Returns `None` for geometry types that cannot be used as a filter.
    #[must_use]
    pub fn intersecting(geometry: &Geometry<f64>) -> Option<Self> {
        let filter = geometry::to_esri(geometry)?;
        Some(Self {
            where_clause: "1=1".to_string(),
            return_geometry: false,
            geometry: Some(filter),
            record_count: DEFAULT_RECORD_COUNT,
        })
    }

    /// Requests feature geometry in the response.
    #[must_use]
    pub const fn with_geometry(mut self, return_geometry: bool) -> Self {
        self.return_geometry = return_geometry;
        self
    }

    /// Caps the number of features returned.
    #[must_use]
    pub const fn with_record_count(mut self, count: u32) -> Self {
        self.record_count = count;
        self
    }

    /// Query string parameters for the `/query` endpoint.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("f", "json".to_string()),
            ("where", self.where_clause.clone()),
            ("outFields", "*".to_string()),
            (
                "returnGeometry",
                if self.return_geometry { "true" } else { "false" }.to_string(),
            ),
            ("outSR", geometry::WGS84_WKID.to_string()),
            ("resultRecordCount", self.record_count.to_string()),
        ];
        if let Some((filter, geometry_type)) = &self.geometry {
            params.push(("geometry", filter.to_string()));
            params.push(("geometryType", (*geometry_type).to_string()));
            params.push(("inSR", geometry::WGS84_WKID.to_string()));
            params.push(("spatialRel", "esriSpatialRelIntersects".to_string()));
        }
        params
    }
}

/// Builds an equality `where` clause, doubling single quotes in the value.
#[must_use]
pub fn where_equals(field: &str, value: &str) -> String {
    format!("{field} = '{}'", value.replace('\'', "''"))
}

/// Strips a trailing `/` or `/query` from a configured layer URL.
#[must_use]
pub fn layer_base(url: &str) -> &str {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix("/query").unwrap_or(url)
}

/// The `/query` endpoint for a layer URL.
#[must_use]
pub fn query_url(layer_url: &str) -> String {
    format!("{}/query", layer_base(layer_url))
}

/// One feature from a query response.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Raw attribute map.
    pub attributes: Map<String, Value>,
    /// Converted geometry, if requested and present.
    pub geometry: Option<Geometry<f64>>,
}

impl Feature {
    /// Looks up an attribute by exact name, then case-insensitively, then
    /// by the last `.`-separated segment of a fully-qualified name
    /// (`PGIS.PGIS.Parcels.PARCELID` matches `PARCELID`).
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        if let Some(v) = self.attributes.get(name) {
            return Some(v);
        }
        let short = name.rsplit('.').next().unwrap_or(name);
        self.attributes.iter().find_map(|(k, v)| {
            let k_short = k.rsplit('.').next().unwrap_or(k);
            (k.eq_ignore_ascii_case(name) || k_short.eq_ignore_ascii_case(short)).then_some(v)
        })
    }

    /// An attribute rendered as trimmed text; `None` when absent, null, or
    /// blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.attribute(name).and_then(value_text)
    }

    /// The first non-blank attribute among `names`.
    #[must_use]
    pub fn first_text(&self, names: &[String]) -> Option<String> {
        names.iter().find_map(|n| self.text(n))
    }

    /// Every attribute rendered as text, skipping nulls.
    #[must_use]
    pub fn attribute_strings(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| value_text(v).map(|s| (k.clone(), s)))
            .collect()
    }
}

/// Renders a JSON scalar as trimmed text.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Runs a layer query and returns its features in service order.
///
/// # Errors
///
/// Returns [`LookupError`] if the request fails or the response has no
/// `features` array.
pub async fn query_features(
    client: &dyn GisClient,
    layer_url: &str,
    query: &LayerQuery,
) -> Result<Vec<Feature>, LookupError> {
    let url = query_url(layer_url);
    let body = client.get_json(&url, &query.params()).await?;
    parse_features(&url, &body)
}

/// Reads the `features` array of a query response.
///
/// # Errors
///
/// Returns [`LookupError::SchemaMismatch`] when `features` is missing.
pub fn parse_features(url: &str, body: &Value) -> Result<Vec<Feature>, LookupError> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| LookupError::schema(url, "no features array in response"))?;

    Ok(features
        .iter()
        .map(|f| Feature {
            attributes: f
                .get("attributes")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            geometry: f.get("geometry").and_then(geometry::from_esri),
        })
        .collect())
}

/// A field from a layer's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Display alias (empty when the layer defines none).
    pub alias: String,
    /// Coded-value domain, code -> label. Empty when the field has none.
    pub coded_values: BTreeMap<String, String>,
}

impl FieldInfo {
    /// Whether the field carries a coded-value domain.
    #[must_use]
    pub fn has_coded_domain(&self) -> bool {
        !self.coded_values.is_empty()
    }
}

/// Layer metadata relevant to field discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerMetadata {
    /// Layer name.
    pub name: String,
    /// Field schema.
    pub fields: Vec<FieldInfo>,
}

/// Fetches `<layer>?f=json`.
///
/// # Errors
///
/// Returns [`LookupError`] if the request fails or the response carries
/// no `fields` array.
pub async fn layer_metadata(
    client: &dyn GisClient,
    layer_url: &str,
) -> Result<LayerMetadata, LookupError> {
    let url = layer_base(layer_url).to_string();
    let body = client.get_json(&url, &[("f", "json".to_string())]).await?;
    let fields = body
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| LookupError::schema(&url, "layer metadata has no fields array"))?;

    Ok(LayerMetadata {
        name: body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        fields: fields.iter().filter_map(parse_field).collect(),
    })
}

/// Reads one entry of a layer's `fields` array.
#[must_use]
pub fn parse_field(field: &Value) -> Option<FieldInfo> {
    let name = field.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }
    let alias = field
        .get("alias")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let coded_values = field
        .get("domain")
        .filter(|d| d.get("type").and_then(Value::as_str) == Some("codedValue"))
        .and_then(|d| d.get("codedValues"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|cv| {
                    let code = value_text(cv.get("code")?)?;
                    let label = value_text(cv.get("name")?)?;
                    Some((code, label))
                })
                .collect()
        })
        .unwrap_or_default();

    Some(FieldInfo {
        name: name.to_string(),
        alias,
        coded_values,
    })
}
