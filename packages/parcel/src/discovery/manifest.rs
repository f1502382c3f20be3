//! Fetching and walking Web AppViewer / Experience Builder manifests.
//!
//! An app item's data document (and the web map it points at) is an
//! arbitrary JSON tree. Layers are found by walking the whole tree for
//! objects whose `url` names a `MapServer` or `FeatureServer` layer rather
//! than by trusting any particular schema version.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use site_lookup_arcgis::query::{self, FieldInfo};
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::DiscoveryFailure;

static ITEM_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[?&]id=|/experience/)([0-9a-f]{32})").expect("valid regex")
});

static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://([^/?#]+)").expect("valid regex"));

static LAYER_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:MapServer|FeatureServer)/\d+/?$").expect("valid regex"));

static SERVICE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:MapServer|FeatureServer)/?$").expect("valid regex"));

/// Keys that may carry a layer's display title, in preference order.
const TITLE_KEYS: &[&str] = &["title", "label", "sourceLabel", "name"];

/// Experience Builder apps are served from this host, but their items live
/// in the ArcGIS Online portal.
const EXPERIENCE_HOST: &str = "experience.arcgis.com";
const ARCGIS_ONLINE_HOST: &str = "www.arcgis.com";

/// The portal host and item ID parsed from a city map application URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    /// Portal host serving `/sharing/rest`.
    pub host: String,
    /// 32-hex application item ID.
    pub item_id: String,
}

impl AppRef {
    /// Parses `?id=<item>` / `&id=<item>` or `/experience/<item>` URLs.
    #[must_use]
    pub fn parse(app_url: &str) -> Option<Self> {
        let app_url = app_url.trim();
        let host = HOST_RE.captures(app_url)?.get(1)?.as_str().to_lowercase();
        let item_id = ITEM_ID_RE.captures(app_url)?.get(1)?.as_str().to_lowercase();
        let host = if host == EXPERIENCE_HOST {
            ARCGIS_ONLINE_HOST.to_string()
        } else {
            host
        };
        Some(Self { host, item_id })
    }

    /// Sharing REST URL for an item on this portal.
    #[must_use]
    pub fn item_url(&self, item_id: &str) -> String {
        format!("https://{}/sharing/rest/content/items/{item_id}", self.host)
    }
}

/// Whether `s` looks like a portal item ID.
#[must_use]
pub fn is_item_id(s: &str) -> bool {
    s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Everything fetched for one application.
#[derive(Debug, Clone, Default)]
pub struct Manifests {
    /// App item description (`items/<id>?f=json`).
    pub app_item: Option<Value>,
    /// App configuration (`items/<id>/data?f=json`).
    pub app_data: Option<Value>,
    /// Web map referenced by the app, if any.
    pub webmap_id: Option<String>,
    /// Web map data document.
    pub webmap_data: Option<Value>,
}

/// Fetches the app item, its data, and the referenced web map.
///
/// The item and its data may fail individually; discovery continues with
/// whichever one loaded.
///
/// # Errors
///
/// * [`LookupError::Network`] if both app requests fail with network errors,
///   or the web map request does
/// * [`LookupError::DiscoveryFailed`] if neither app document is readable
pub async fn fetch_manifests(
    client: &dyn GisClient,
    app: &AppRef,
) -> Result<Manifests, LookupError> {
    let item_url = app.item_url(&app.item_id);
    let params = [("f", "json".to_string())];

    let item = client.get_json(&item_url, &params).await;
    let data = client.get_json(&format!("{item_url}/data"), &params).await;

    let (app_item, app_data) = match (item, data) {
        (Err(item_err), Err(data_err)) => {
            log::warn!("App item {} unavailable: {item_err}; {data_err}", app.item_id);
            return Err(match (item_err, data_err) {
                (e @ LookupError::Network { .. }, LookupError::Network { .. }) => e,
                _ => LookupError::DiscoveryFailed(DiscoveryFailure::AppItemUnavailable),
            });
        }
        (item, data) => (ok_or_warn(item), ok_or_warn(data)),
    };

    let webmap_id = find_webmap_id(&[app_data.as_ref(), app_item.as_ref()]);
    let webmap_data = match &webmap_id {
        Some(id) => {
            log::debug!("App {} references web map {id}", app.item_id);
            match client
                .get_json(&format!("{}/data", app.item_url(id)), &params)
                .await
            {
                Ok(value) => Some(value),
                Err(e @ LookupError::Network { .. }) => return Err(e),
                Err(e) => {
                    log::warn!("Web map {id} unavailable: {e}");
                    None
                }
            }
        }
        None => None,
    };

    Ok(Manifests {
        app_item,
        app_data,
        webmap_id,
        webmap_data,
    })
}

fn ok_or_warn(result: Result<Value, LookupError>) -> Option<Value> {
    result
        .inspect_err(|e| log::warn!("Skipping app document: {e}"))
        .ok()
}

/// Finds the web map an app displays.
///
/// Checks `webmap`, `values.webmap`, `values.config.webmap` and
/// `map.itemId` on each source in order, then any Experience Builder data
/// source of type `WEB_MAP`.
#[must_use]
pub fn find_webmap_id(sources: &[Option<&Value>]) -> Option<String> {
    let sources: Vec<&Value> = sources.iter().flatten().copied().collect();

    let direct = sources.iter().find_map(|src| {
        [
            src.pointer("/webmap"),
            src.pointer("/values/webmap"),
            src.pointer("/values/config/webmap"),
            src.pointer("/map/itemId"),
        ]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|id| is_item_id(id))
        .map(str::to_string)
    });

    direct.or_else(|| sources.iter().find_map(|src| find_web_map_source(src)))
}

fn find_web_map_source(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            let is_web_map = map.get("type").and_then(Value::as_str) == Some("WEB_MAP");
            if is_web_map
                && let Some(id) = map.get("itemId").and_then(Value::as_str)
                && is_item_id(id)
            {
                return Some(id.to_string());
            }
            map.values().find_map(find_web_map_source)
        }
        Value::Array(items) => items.iter().find_map(find_web_map_source),
        _ => None,
    }
}

/// A layer referenced by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLayer {
    /// Display title (may be empty).
    pub title: String,
    /// Layer URL ending in the layer index.
    pub url: String,
    /// Field schema embedded in the manifest, when present.
    pub fields: Option<Vec<FieldInfo>>,
}

/// Collects every distinct layer in the app and web map documents, in
/// document order.
#[must_use]
pub fn collect_layers(manifests: &Manifests) -> Vec<DiscoveredLayer> {
    let mut layers = Vec::new();
    for doc in [&manifests.webmap_data, &manifests.app_data]
        .into_iter()
        .flatten()
    {
        walk(doc, &mut layers);
    }
    layers
}

fn walk(value: &Value, out: &mut Vec<DiscoveredLayer>) {
    match value {
        Value::Object(map) => {
            for layer in layers_in_object(map) {
                push_layer(out, layer);
            }
            for child in map.values() {
                walk(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        _ => {}
    }
}

fn push_layer(out: &mut Vec<DiscoveredLayer>, layer: DiscoveredLayer) {
    match out
        .iter_mut()
        .find(|l| l.url.eq_ignore_ascii_case(&layer.url))
    {
        Some(existing) => {
            if existing.title.is_empty() {
                existing.title = layer.title;
            }
            if existing.fields.is_none() {
                existing.fields = layer.fields;
            }
        }
        None => out.push(layer),
    }
}

fn layers_in_object(map: &Map<String, Value>) -> Vec<DiscoveredLayer> {
    let Some(url) = map.get("url").and_then(Value::as_str).map(str::trim) else {
        return Vec::new();
    };
    let url = query::layer_base(url);

    if LAYER_URL_RE.is_match(url) {
        return vec![DiscoveredLayer {
            title: title_of(map),
            url: url.to_string(),
            fields: embedded_fields(map),
        }];
    }

    if !SERVICE_URL_RE.is_match(url) {
        return Vec::new();
    }

    if let Some(id) = map.get("layerId").and_then(layer_index) {
        return vec![DiscoveredLayer {
            title: title_of(map),
            url: format!("{url}/{id}"),
            fields: embedded_fields(map),
        }];
    }

    // Map image layers list their sublayers without URLs.
    map.get("layers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|sub| {
            let sub = sub.as_object()?;
            let id = sub.get("id").and_then(layer_index)?;
            Some(DiscoveredLayer {
                title: title_of(sub),
                url: format!("{url}/{id}"),
                fields: embedded_fields(sub),
            })
        })
        .collect()
}

fn layer_index(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn title_of(map: &Map<String, Value>) -> String {
    TITLE_KEYS
        .iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Field schema from `layerDefinition.fields`, `popupInfo.fieldInfos`, or
/// `schema.fields`.
fn embedded_fields(map: &Map<String, Value>) -> Option<Vec<FieldInfo>> {
    if let Some(fields) = map.get("layerDefinition").and_then(|d| d.get("fields")) {
        return non_empty(field_values(fields).filter_map(query::parse_field).collect());
    }

    if let Some(infos) = map
        .get("popupInfo")
        .and_then(|p| p.get("fieldInfos"))
        .and_then(Value::as_array)
    {
        return non_empty(infos.iter().filter_map(popup_field).collect());
    }

    map.get("schema")
        .and_then(|s| s.get("fields"))
        .and_then(|fields| non_empty(field_values(fields).filter_map(query::parse_field).collect()))
}

fn popup_field(info: &Value) -> Option<FieldInfo> {
    let name = info.get("fieldName").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }
    Some(FieldInfo {
        name: name.to_string(),
        alias: info
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        coded_values: BTreeMap::new(),
    })
}

/// Field definitions may be an array or, in Experience Builder schemas, an
/// object keyed by field name.
fn field_values(fields: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match fields {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

fn non_empty(fields: Vec<FieldInfo>) -> Option<Vec<FieldInfo>> {
    (!fields.is_empty()).then_some(fields)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const APP_ID: &str = "1f4c3a2b9d8e4f6a8b7c6d5e4f3a2b1c";
    const WEBMAP_ID: &str = "aaaabbbbccccddddeeeeffff00001111";

    #[test]
    fn parses_web_appviewer_url() {
        let app = AppRef::parse(&format!(
            "https://clearwater.maps.arcgis.com/apps/webappviewer/index.html?id={APP_ID}"
        ))
        .unwrap();
        assert_eq!(app.host, "clearwater.maps.arcgis.com");
        assert_eq!(app.item_id, APP_ID);
        assert_eq!(
            app.item_url(&app.item_id),
            format!("https://clearwater.maps.arcgis.com/sharing/rest/content/items/{APP_ID}")
        );
    }

    #[test]
    fn parses_experience_builder_url() {
        let app = AppRef::parse(&format!("https://experience.arcgis.com/experience/{APP_ID}/"))
            .unwrap();
        assert_eq!(app.host, "www.arcgis.com");
        assert_eq!(app.item_id, APP_ID);
    }

    #[test]
    fn rejects_url_without_item_id() {
        assert!(AppRef::parse("https://example.gov/maps/zoning").is_none());
        assert!(AppRef::parse("https://x.maps.arcgis.com/index.html?appid=abc").is_none());
        assert!(AppRef::parse("not a url").is_none());
    }

    #[test]
    fn finds_webmap_in_wab_config() {
        let data = json!({ "map": { "itemId": WEBMAP_ID, "mapOptions": {} } });
        assert_eq!(
            find_webmap_id(&[Some(&data), None]).as_deref(),
            Some(WEBMAP_ID)
        );

        let data = json!({ "values": { "config": { "webmap": WEBMAP_ID } } });
        assert_eq!(find_webmap_id(&[Some(&data)]).as_deref(), Some(WEBMAP_ID));
    }

    #[test]
    fn finds_webmap_in_experience_data_sources() {
        let data = json!({
            "dataSources": {
                "dataSource_1": { "type": "WEB_MAP", "itemId": WEBMAP_ID }
            }
        });
        assert_eq!(find_webmap_id(&[Some(&data)]).as_deref(), Some(WEBMAP_ID));
    }

    #[test]
    fn ignores_malformed_webmap_ids() {
        let data = json!({ "webmap": "not-an-id", "values": { "webmap": 42 } });
        assert_eq!(find_webmap_id(&[Some(&data)]), None);
    }

    #[test]
    fn collects_layers_from_nested_documents() {
        let manifests = Manifests {
            webmap_data: Some(json!({
                "operationalLayers": [
                    {
                        "title": "Zoning Districts",
                        "url": "https://gis.example.gov/arcgis/rest/services/Planning/MapServer/2",
                        "layerDefinition": { "fields": [
                            { "name": "ZONE_CODE", "alias": "Zone Code" }
                        ] }
                    },
                    {
                        "title": "Planning",
                        "url": "https://gis.example.gov/arcgis/rest/services/Planning/MapServer",
                        "layers": [
                            { "id": 2, "name": "Zoning" },
                            { "id": 5, "name": "Future Land Use" }
                        ]
                    },
                    {
                        "title": "Basemap",
                        "url": "https://tiles.example.gov/arcgis/rest/services/Basemap/MapServer"
                    }
                ]
            })),
            app_data: Some(json!({
                "dataSources": { "ds": {
                    "sourceLabel": "Parcels",
                    "url": "https://gis.example.gov/arcgis/rest/services/Parcels/FeatureServer",
                    "layerId": "0",
                    "schema": { "fields": { "PIN": { "name": "PIN", "alias": "Parcel" } } }
                } }
            })),
            ..Manifests::default()
        };

        let layers = collect_layers(&manifests);
        let urls: Vec<&str> = layers.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://gis.example.gov/arcgis/rest/services/Planning/MapServer/2",
                "https://gis.example.gov/arcgis/rest/services/Planning/MapServer/5",
                "https://gis.example.gov/arcgis/rest/services/Parcels/FeatureServer/0",
            ]
        );
        assert_eq!(layers[0].title, "Zoning Districts");
        assert_eq!(layers[0].fields.as_ref().unwrap()[0].name, "ZONE_CODE");
        assert_eq!(layers[1].title, "Future Land Use");
        assert_eq!(layers[1].fields, None);
        assert_eq!(layers[2].title, "Parcels");
        assert_eq!(layers[2].fields.as_ref().unwrap()[0].alias, "Parcel");
    }

    #[test]
    fn reads_popup_field_infos() {
        let manifests = Manifests {
            webmap_data: Some(json!({ "operationalLayers": [{
                "title": "Future Land Use",
                "url": "https://gis.example.gov/arcgis/rest/services/FLU/FeatureServer/0/",
                "popupInfo": { "fieldInfos": [
                    { "fieldName": "FLU_DESC", "label": "Future Land Use" },
                    { "fieldName": "", "label": "blank" }
                ] }
            }] })),
            ..Manifests::default()
        };
        let layers = collect_layers(&manifests);
        assert_eq!(layers.len(), 1);
        assert_eq!(
            layers[0].url,
            "https://gis.example.gov/arcgis/rest/services/FLU/FeatureServer/0"
        );
        let fields = layers[0].fields.as_ref().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].alias, "Future Land Use");
    }
}
