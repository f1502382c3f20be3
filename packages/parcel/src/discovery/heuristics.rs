//! Keyword scoring for layer titles and field names.

use std::cmp::Reverse;

use site_lookup_arcgis::query::FieldInfo;
use site_lookup_parcel_models::DesignationKind;
use site_lookup_parcel_models::config::{FieldKeywords, LayerKeywords};

use super::manifest::DiscoveredLayer;

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(&k.to_lowercase()))
}

/// Additive title score: each keyword group counts once.
#[must_use]
pub fn title_score(keywords: &LayerKeywords, title: &str) -> i32 {
    let title = title.to_lowercase();
    keywords
        .scores
        .iter()
        .filter(|s| contains_any(&title, &s.keywords))
        .map(|s| s.score)
        .sum()
}

/// Whether the title names a zoning or FLU layer.
#[must_use]
pub fn is_candidate(keywords: &LayerKeywords, title: &str) -> bool {
    matches_kind(keywords, DesignationKind::Zoning, title)
        || matches_kind(keywords, DesignationKind::FutureLandUse, title)
}

/// Whether the title names a layer of this kind.
#[must_use]
pub fn matches_kind(keywords: &LayerKeywords, kind: DesignationKind, title: &str) -> bool {
    contains_any(&title.to_lowercase(), keywords.for_kind(kind))
}

/// Orders candidates for binding `kind`: layers titled for this kind come
/// first, then the rest; each group by descending title score, ties kept
/// in document order.
#[must_use]
pub fn order_candidates<'a>(
    keywords: &LayerKeywords,
    kind: DesignationKind,
    candidates: &[&'a DiscoveredLayer],
) -> Vec<&'a DiscoveredLayer> {
    let mut ordered = candidates.to_vec();
    ordered.sort_by_key(|layer| {
        (
            Reverse(matches_kind(keywords, kind, &layer.title)),
            Reverse(title_score(keywords, &layer.title)),
        )
    });
    ordered
}

/// Score of a field as the code column for `kind`; zero or less means no
/// match.
#[must_use]
pub fn field_score(keywords: &FieldKeywords, kind: DesignationKind, field: &FieldInfo) -> i32 {
    let text = format!("{} {}", field.name, field.alias).to_lowercase();
    let Some(base) = keywords
        .for_kind(kind)
        .iter()
        .filter(|rule| rule.matches(&text))
        .map(|rule| rule.score)
        .max()
    else {
        return 0;
    };

    let name = field.name.to_lowercase();
    let mut score = base;
    if field.has_coded_domain() {
        score += keywords.coded_domain_bonus;
    }
    if contains_any(&name, &keywords.code_hints) {
        score += keywords.code_hint_bonus;
    }
    if contains_any(&name, &keywords.description_hints) {
        score -= keywords.description_hint_penalty;
    }
    score
}

/// Outcome of choosing a code field from one layer's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPick {
    /// A single best field.
    Bound(String),
    /// Several distinct fields share the best score.
    Ambiguous(Vec<String>),
    /// No field scored above zero.
    NoMatch,
}

/// Picks the code field for `kind`.
#[must_use]
pub fn pick_field(keywords: &FieldKeywords, kind: DesignationKind, fields: &[FieldInfo]) -> FieldPick {
    let scored: Vec<(&FieldInfo, i32)> = fields
        .iter()
        .map(|f| (f, field_score(keywords, kind, f)))
        .filter(|(_, score)| *score > 0)
        .collect();

    let Some(best) = scored.iter().map(|(_, score)| *score).max() else {
        return FieldPick::NoMatch;
    };

    let mut top: Vec<String> = Vec::new();
    for (field, _) in scored.iter().filter(|(_, score)| *score == best) {
        if !top.iter().any(|n| n.eq_ignore_ascii_case(&field.name)) {
            top.push(field.name.clone());
        }
    }

    match top.len() {
        1 => FieldPick::Bound(top.remove(0)),
        _ => FieldPick::Ambiguous(top),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::registry::default_keywords;

    fn field(name: &str, alias: &str) -> FieldInfo {
        FieldInfo {
            name: name.to_string(),
            alias: alias.to_string(),
            coded_values: BTreeMap::new(),
        }
    }

    fn layer(title: &str) -> DiscoveredLayer {
        DiscoveredLayer {
            title: title.to_string(),
            url: format!("https://gis.example.gov/rest/services/{title}/MapServer/0"),
            fields: None,
        }
    }

    #[test]
    fn scores_layer_titles() {
        let keywords = default_keywords();
        assert_eq!(title_score(&keywords.layers, "Zoning Districts"), 50);
        assert_eq!(title_score(&keywords.layers, "Future Land Use 2045"), 50);
        assert_eq!(title_score(&keywords.layers, "Zoning Overlay"), 40);
        assert_eq!(title_score(&keywords.layers, "Historic Zoning Overlay"), 35);
        assert_eq!(title_score(&keywords.layers, "Parcels"), 0);
        assert!(is_candidate(&keywords.layers, "FLUM"));
        assert!(!is_candidate(&keywords.layers, "Street Centerlines"));
    }

    #[test]
    fn orders_matching_kind_first() {
        let keywords = default_keywords();
        let zoning = layer("Zoning");
        let overlay = layer("Zoning Overlay");
        let flu = layer("Future Land Use");
        let candidates = [&overlay, &flu, &zoning];

        let ordered = order_candidates(&keywords.layers, DesignationKind::Zoning, &candidates);
        let titles: Vec<&str> = ordered.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["Zoning", "Zoning Overlay", "Future Land Use"]);

        let ordered =
            order_candidates(&keywords.layers, DesignationKind::FutureLandUse, &candidates);
        assert_eq!(ordered[0].title, "Future Land Use");
    }

    #[test]
    fn prefers_code_over_description_fields() {
        let keywords = default_keywords();
        let fields = [
            field("OBJECTID", "OBJECTID"),
            field("ZONE_CODE", "Zone Code"),
            field("ZONE_DESC", "Zone Description"),
            field("FLU_DESC", "Future Land Use"),
        ];
        assert_eq!(
            pick_field(&keywords.fields, DesignationKind::Zoning, &fields),
            FieldPick::Bound("ZONE_CODE".to_string())
        );
        assert_eq!(
            pick_field(&keywords.fields, DesignationKind::FutureLandUse, &fields),
            FieldPick::Bound("FLU_DESC".to_string())
        );
    }

    #[test]
    fn coded_domain_breaks_ties() {
        let keywords = default_keywords();
        let mut coded = field("ZONING", "Zoning");
        coded.coded_values.insert("R-3".to_string(), "Residential".to_string());
        let fields = [field("ZONING_1", "Zoning"), coded];
        assert_eq!(
            pick_field(&keywords.fields, DesignationKind::Zoning, &fields),
            FieldPick::Bound("ZONING".to_string())
        );
    }

    #[test]
    fn reports_ties_as_ambiguous() {
        let keywords = default_keywords();
        let fields = [field("ZONING", "Zoning"), field("ZONING_2020", "Zoning 2020")];
        assert_eq!(
            pick_field(&keywords.fields, DesignationKind::Zoning, &fields),
            FieldPick::Ambiguous(vec!["ZONING".to_string(), "ZONING_2020".to_string()])
        );
    }

    #[test]
    fn no_keyword_match_is_no_match() {
        let keywords = default_keywords();
        let mut coded = field("STATUS", "Status");
        coded.coded_values.insert("A".to_string(), "Active".to_string());
        assert_eq!(
            pick_field(&keywords.fields, DesignationKind::Zoning, &[coded]),
            FieldPick::NoMatch
        );
    }
}
