//! Ordered coordinate extraction rules for map URLs and embed bodies.
//!
//! Rules are tried in order and the first in-bounds pair wins; a rule whose
//! captures fail to parse or fall outside the bounding box is skipped and
//! the next rule is tried. Rules are never combined.

use crate::models::in_bounds;
use regex::Regex;
use url::Url;

/// Which coordinate the first captured number holds. Embed and permalink
/// formats disagree on this, which has been a recurring bug source, so the
/// marker→field mapping lives in an explicit table rather than being
/// inferred from the markers.
#[derive(Debug, Clone, Copy)]
enum CaptureOrder {
    LngLat,
    LatLng,
}

struct EmbedMarkerRule {
    first: &'static str,
    second: &'static str,
    order: CaptureOrder,
}

/// `!2d<lng>…!3d<lat>` is the common embed form; `!3d<lat>…!4d<lng>` the
/// permalink alternate. Note the inverted capture order between the two.
const EMBED_MARKER_RULES: &[EmbedMarkerRule] = &[
    EmbedMarkerRule {
        first: "!2d",
        second: "!3d",
        order: CaptureOrder::LngLat,
    },
    EmbedMarkerRule {
        first: "!3d",
        second: "!4d",
        order: CaptureOrder::LatLng,
    },
];

/// Extracts a validated (latitude, longitude) pair from a URL or page body.
///
/// Returns `None` when no rule yields an in-bounds pair; the caller decides
/// whether that is a parse failure worth retrying.
pub fn extract_coordinates(text: &str) -> Option<(f64, f64)> {
    if let Some(pair) = match_embed_markers(text) {
        return Some(pair);
    }
    if let Some(pair) = match_at_pattern(text) {
        return Some(pair);
    }
    if let Some(pair) = match_query_params(text) {
        return Some(pair);
    }
    None
}

/// Rule 1: dual-marker embed pattern.
fn match_embed_markers(text: &str) -> Option<(f64, f64)> {
    for rule in EMBED_MARKER_RULES {
        let re = Regex::new(&format!(
            r"{}(-?\d+(?:\.\d+)?).*?{}(-?\d+(?:\.\d+)?)",
            regex::escape(rule.first),
            regex::escape(rule.second)
        ))
        .unwrap();

        if let Some(caps) = re.captures(text) {
            let a: f64 = match caps[1].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let b: f64 = match caps[2].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let (lat, lng) = match rule.order {
                CaptureOrder::LngLat => (b, a),
                CaptureOrder::LatLng => (a, b),
            };
            if in_bounds(lat, lng) {
                return Some((lat, lng));
            }
            tracing::debug!("Embed pair out of bounds: {}, {}", lat, lng);
        }
    }
    None
}

/// Rule 2: `@<lat>,<lon>` directly in the URL path.
fn match_at_pattern(text: &str) -> Option<(f64, f64)> {
    let re = Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").unwrap();
    let caps = re.captures(text)?;
    let lat: f64 = caps[1].parse().ok()?;
    let lng: f64 = caps[2].parse().ok()?;
    if in_bounds(lat, lng) {
        Some((lat, lng))
    } else {
        tracing::debug!("@-pattern pair out of bounds: {}, {}", lat, lng);
        None
    }
}

/// Rules 3 and 4: query parameters. `ll=lat,lon`, separate `lat=`/`lng=`
/// parameters, and the `q=lat,lon` form used by "view on map" buttons.
fn match_query_params(text: &str) -> Option<(f64, f64)> {
    let url = Url::parse(text).ok()?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    if let Some(pair) = lookup("ll").and_then(parse_comma_pair) {
        return Some(pair);
    }

    if let (Some(lat_s), Some(lng_s)) = (lookup("lat"), lookup("lng")) {
        if let (Ok(lat), Ok(lng)) = (lat_s.parse::<f64>(), lng_s.parse::<f64>()) {
            if in_bounds(lat, lng) {
                return Some((lat, lng));
            }
            tracing::debug!("lat/lng params out of bounds: {}, {}", lat, lng);
        }
    }

    if let Some(pair) = lookup("q").and_then(parse_comma_pair) {
        return Some(pair);
    }

    None
}

fn parse_comma_pair(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',');
    let lat: f64 = parts.next()?.trim().parse().ok()?;
    let lng: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if in_bounds(lat, lng) {
        Some((lat, lng))
    } else {
        tracing::debug!("Comma pair out of bounds: {}, {}", lat, lng);
        None
    }
}
