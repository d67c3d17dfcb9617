use std::fs;
use std::path::{Path, PathBuf};

use scene::tree::{TreeRecord, leading_number};
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Debug)]
pub enum DatasetError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    NotAFeatureCollection,
    InvalidFeature {
        index: usize,
        reason: String,
    },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Io { path, source } => {
                write!(f, "failed to read dataset {}: {source}", path.display())
            }
            DatasetError::Parse(e) => write!(f, "JSON parse error: {e}"),
            DatasetError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            DatasetError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Io { source, .. } => Some(source),
            DatasetError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Tree inventory GeoJSON: one `Point` feature per tree.
///
/// Attribute problems never fail the load; they come through as `None` and
/// are defaulted when the catalog is built. A feature without point
/// coordinates does fail it, since there is nowhere to put the tree.
pub fn parse_tree_dataset(payload: &str) -> Result<Vec<TreeRecord>, DatasetError> {
    let value: Value = serde_json::from_str(payload).map_err(DatasetError::Parse)?;
    tree_records_from_value(&value)
}

pub fn load_tree_dataset(path: impl AsRef<Path>) -> Result<Vec<TreeRecord>, DatasetError> {
    let path = path.as_ref();
    let payload = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_tree_dataset(&payload)?;
    info!(path = %path.display(), records = records.len(), "dataset loaded");
    Ok(records)
}

pub fn tree_records_from_value(value: &Value) -> Result<Vec<TreeRecord>, DatasetError> {
    let obj = value
        .as_object()
        .ok_or(DatasetError::NotAFeatureCollection)?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(DatasetError::NotAFeatureCollection)?;
    if ty != "FeatureCollection" {
        return Err(DatasetError::NotAFeatureCollection);
    }
    let features = obj
        .get("features")
        .and_then(|v| v.as_array())
        .ok_or(DatasetError::NotAFeatureCollection)?;

    let mut records = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let feat_obj = feature.as_object().ok_or(DatasetError::InvalidFeature {
            index,
            reason: "feature must be an object".to_string(),
        })?;
        let (lng, lat) = point_coordinates(feat_obj.get("geometry"))
            .map_err(|reason| DatasetError::InvalidFeature { index, reason })?;

        let empty = Map::new();
        let props = feat_obj
            .get("properties")
            .and_then(|v| v.as_object())
            .unwrap_or(&empty);

        records.push(TreeRecord {
            lat,
            lng,
            genus: text(props, "genus", index),
            common_name: text(props, "commonname", index),
            species: text(props, "species", index),
            diameter_in: number(props, "diameterin", index),
            height_ft: text(props, "heightft", index),
            condition: text(props, "condition", index),
            neighborhood: text(props, "neighborhood", index),
        });
    }
    Ok(records)
}

fn point_coordinates(geometry: Option<&Value>) -> Result<(f64, f64), String> {
    let geom = geometry
        .and_then(|g| g.as_object())
        .ok_or_else(|| "feature missing geometry".to_string())?;
    match geom.get("type").and_then(|v| v.as_str()) {
        Some("Point") => {}
        Some(other) => return Err(format!("expected Point geometry, found {other}")),
        None => return Err("geometry missing type".to_string()),
    }
    let coords = geom
        .get("coordinates")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "Point missing coordinates".to_string())?;
    match (
        coords.first().and_then(|v| v.as_f64()),
        coords.get(1).and_then(|v| v.as_f64()),
    ) {
        (Some(lng), Some(lat)) => Ok((lng, lat)),
        _ => Err("Point coordinates must be [lng, lat] numbers".to_string()),
    }
}

/// Strings pass through; numbers are stringified; anything else is missing.
fn text(props: &Map<String, Value>, key: &str, index: usize) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => {
            debug!(feature = index, key, value = %other, "ignoring non-text attribute");
            None
        }
    }
}

/// Numbers pass through; strings contribute their leading number.
fn number(props: &Map<String, Value>, key: &str, index: usize) -> Option<f64> {
    match props.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let parsed = leading_number(s);
            if parsed.is_none() {
                debug!(feature = index, key, value = %s, "ignoring non-numeric attribute");
            }
            parsed
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{DatasetError, load_tree_dataset, parse_tree_dataset};

    #[test]
    fn parses_lenient_attributes() {
        let records = parse_tree_dataset(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[-78.9,36.0]},
                 "properties":{"genus":"Acer","diameterin":"12.5","heightft":"20-40","neighborhood":"Duke Park"}},
                {"type":"Feature","geometry":{"type":"Point","coordinates":[-78.8,35.9]},
                 "properties":{"diameterin":8,"heightft":30,"condition":["odd"]}}
            ]}"#,
        )
        .expect("parse");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lng, -78.9);
        assert_eq!(records[0].lat, 36.0);
        assert_eq!(records[0].diameter_in, Some(12.5));
        assert_eq!(records[0].genus.as_deref(), Some("Acer"));
        assert_eq!(records[1].diameter_in, Some(8.0));
        assert_eq!(records[1].height_ft.as_deref(), Some("30"));
        assert_eq!(records[1].condition, None);
        assert_eq!(records[1].genus, None);
    }

    #[test]
    fn rejects_wrong_top_level_type() {
        let err = parse_tree_dataset(r#"{"type":"Feature","features":[]}"#).unwrap_err();
        assert!(matches!(err, DatasetError::NotAFeatureCollection));

        let err = parse_tree_dataset("not json").unwrap_err();
        assert!(matches!(err, DatasetError::Parse(_)));
    }

    #[test]
    fn feature_without_point_is_an_error() {
        let err = parse_tree_dataset(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":{}}
            ]}"#,
        )
        .unwrap_err();
        match err {
            DatasetError::InvalidFeature { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("LineString"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_tree_dataset("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn loads_bundled_fixture() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../apps/viewer_web/assets/trees-data.json");
        let records = load_tree_dataset(path).expect("fixture");
        assert_eq!(records.len(), 10);
        assert_eq!(records[1].diameter_in, Some(11.0));
        assert_eq!(records[6].diameter_in, None);
        assert_eq!(records[6].height_ft, None);
        assert_eq!(records[9].genus, None);
        assert_eq!(records[9].neighborhood, None);
    }
}
