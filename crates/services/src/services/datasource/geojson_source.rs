use geojson::{FeatureCollection, GeoJson};

use super::DataSourceError;

/// Sources already serving GeoJSON are passed through. A lone feature is
/// wrapped so clients always receive a collection.
pub(super) fn parse(body: &str) -> Result<FeatureCollection, DataSourceError> {
    match body.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(DataSourceError::Payload(
            "bare geometry instead of a feature collection".to_string(),
        )),
    }
}
