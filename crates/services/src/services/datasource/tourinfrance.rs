//! TourInFrance (TIF) XML feeds.
//!
//! Each `<OI>` element is one tourism object. Objects without usable
//! coordinates are skipped.

use geojson::{Feature, FeatureCollection, JsonValue};
use quick_xml::{Reader, events::Event};

use super::{DataSourceError, LanguageChoice, Picture, pick_localized, point_feature};

const PHONE: &str = "04.02.01";
const EMAIL: &str = "04.02.04";
const WEBSITE: &str = "04.02.05";

#[derive(Default)]
struct ObjectBuilder {
    identifier: Option<String>,
    titles: Vec<(Option<String>, String)>,
    descriptions: Vec<(Option<String>, String)>,
    phone: Option<String>,
    email: Option<String>,
    website: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    pictures: Vec<Picture>,
    lang: Option<String>,
    com_type: Option<String>,
    picture: Option<Picture>,
}

impl ObjectBuilder {
    fn text(&mut self, element: &str, value: String) {
        match element {
            "identifier" => {
                self.identifier.get_or_insert(value);
            }
            "title" => self.titles.push((self.lang.clone(), value)),
            "description" => self.descriptions.push((self.lang.clone(), value)),
            "Latitude" if self.latitude.is_none() => self.latitude = parse_decimal(&value),
            "Longitude" if self.longitude.is_none() => self.longitude = parse_decimal(&value),
            "Coord" => {
                let slot = match self.com_type.as_deref() {
                    Some(PHONE) => &mut self.phone,
                    Some(EMAIL) => &mut self.email,
                    Some(WEBSITE) => &mut self.website,
                    _ => return,
                };
                slot.get_or_insert(value);
            }
            "URL" | "Titre" | "Copyright" => {
                if let Some(picture) = self.picture.as_mut() {
                    match element {
                        "URL" => picture.url = value,
                        "Titre" => picture.legend = value,
                        _ => picture.copyright = value,
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self, language: &LanguageChoice) -> Option<Feature> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            tracing::trace!(identifier = ?self.identifier, "Skipping TIF object without coordinates");
            return None;
        };
        let pictures = self
            .pictures
            .iter()
            .map(|p| serde_json::to_value(p).unwrap_or(JsonValue::Null))
            .collect::<Vec<_>>();
        Some(point_feature(
            self.identifier,
            longitude,
            latitude,
            vec![
                ("title", pick_localized(&self.titles, language).into()),
                ("description", pick_localized(&self.descriptions, language).into()),
                ("phone", self.phone.into()),
                ("email", self.email.into()),
                ("website", self.website.into()),
                ("pictures", JsonValue::Array(pictures)),
            ],
        ))
    }
}

/// French feeds sometimes use a decimal comma.
fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}

pub(super) fn parse(
    body: &str,
    language: &LanguageChoice,
) -> Result<FeatureCollection, DataSourceError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut features = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<ObjectBuilder> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "OI" => current = Some(ObjectBuilder::default()),
                    "title" | "description" => {
                        if let Some(object) = current.as_mut() {
                            object.lang = match e.try_get_attribute("xml:lang")? {
                                Some(attr) => Some(attr.unescape_value()?.into_owned()),
                                None => None,
                            };
                        }
                    }
                    "DetailMoyenCom" => {
                        if let Some(object) = current.as_mut() {
                            object.com_type = match e.try_get_attribute("type")? {
                                Some(attr) => Some(attr.unescape_value()?.into_owned()),
                                None => None,
                            };
                        }
                    }
                    "DetailMultimedia" => {
                        if let Some(object) = current.as_mut() {
                            object.picture = Some(Picture::default());
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Text(t) => {
                if let (Some(object), Some(element)) = (current.as_mut(), stack.last()) {
                    object.text(element, t.unescape()?.into_owned());
                }
            }
            Event::CData(c) => {
                if let (Some(object), Some(element)) = (current.as_mut(), stack.last()) {
                    object.text(element, String::from_utf8_lossy(&c.into_inner()).into_owned());
                }
            }
            Event::End(e) => {
                stack.pop();
                match e.local_name().as_ref() {
                    b"OI" => {
                        if let Some(feature) =
                            current.take().and_then(|object| object.finish(language))
                        {
                            features.push(feature);
                        }
                    }
                    b"DetailMoyenCom" => {
                        if let Some(object) = current.as_mut() {
                            object.com_type = None;
                        }
                    }
                    b"DetailMultimedia" => {
                        if let Some(object) = current.as_mut()
                            && let Some(picture) = object.picture.take()
                            && !picture.url.is_empty()
                        {
                            object.pictures.push(picture);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
