//! SITRA (Apidae) JSON exports.
//!
//! Localised texts are objects keyed `libelleFr`, `libelleEn`, ...

use geojson::{FeatureCollection, JsonValue};
use serde_json::Value;

use super::{DataSourceError, LanguageChoice, Picture, feature_with};

const PHONE: i64 = 201;
const WEBSITE: i64 = 205;

fn libelle_key(lang: &str) -> String {
    let mut chars = lang.chars();
    match chars.next() {
        Some(first) => format!(
            "libelle{}{}",
            first.to_ascii_uppercase(),
            chars.as_str().to_ascii_lowercase()
        ),
        None => "libelle".to_string(),
    }
}

fn localized(value: Option<&Value>, language: &LanguageChoice) -> Option<String> {
    let object = value?.as_object()?;
    language
        .candidates()
        .iter()
        .find_map(|lang| object.get(&libelle_key(lang)).and_then(Value::as_str))
        .map(str::to_string)
}

fn contact(object: &Value, type_id: i64) -> Option<String> {
    object
        .pointer("/informations/moyensCommunication")?
        .as_array()?
        .iter()
        .find(|com| com.pointer("/type/id").and_then(Value::as_i64) == Some(type_id))?
        .pointer("/coordonnees/fr")?
        .as_str()
        .map(str::to_string)
}

fn pictures(object: &Value, language: &LanguageChoice) -> Vec<Picture> {
    let Some(illustrations) = object.get("illustrations").and_then(Value::as_array) else {
        return Vec::new();
    };
    illustrations
        .iter()
        .filter_map(|illustration| {
            let url = illustration
                .pointer("/traductionFichiers/0/url")?
                .as_str()?
                .to_string();
            let copyright = match illustration.get("copyright") {
                Some(Value::String(s)) => s.clone(),
                other => localized(other, language).unwrap_or_default(),
            };
            Some(Picture {
                url,
                legend: localized(illustration.get("nom"), language).unwrap_or_default(),
                copyright,
            })
        })
        .collect()
}

pub(super) fn parse(
    body: &str,
    language: &LanguageChoice,
) -> Result<FeatureCollection, DataSourceError> {
    let document: Value = serde_json::from_str(body)?;
    let objects = document
        .get("objetsTouristiques")
        .and_then(Value::as_array)
        .ok_or_else(|| DataSourceError::Payload("missing objetsTouristiques".to_string()))?;

    let mut features = Vec::with_capacity(objects.len());
    for object in objects {
        let id = object.get("id").map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let geometry = match object.pointer("/localisation/geolocalisation/geoJson") {
            Some(value) => match geojson::Geometry::from_json_value(value.clone()) {
                Ok(geometry) => Some(geometry),
                Err(e) => {
                    tracing::warn!(object_id = ?id, error = %e, "Skipping SITRA object with invalid geometry");
                    continue;
                }
            },
            None => None,
        };
        let pictures = pictures(object, language)
            .iter()
            .map(|p| serde_json::to_value(p).unwrap_or(JsonValue::Null))
            .collect::<Vec<_>>();
        features.push(feature_with(
            id,
            geometry,
            vec![
                ("title", localized(object.get("nom"), language).into()),
                (
                    "description",
                    localized(object.pointer("/presentation/descriptifCourt"), language).into(),
                ),
                ("phone", contact(object, PHONE).into()),
                ("website", contact(object, WEBSITE).into()),
                ("pictures", JsonValue::Array(pictures)),
            ],
        ));
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
