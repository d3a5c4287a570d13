//! Planar and 3D helpers over coordinate tuples.
//!
//! Paths are stored as WKT and handled here as plain `Coord3` slices. Spatial
//! predicates (distance, intersection, locate along a line) are planar and
//! ignore elevation, the way the GIS database computes them; lengths used for
//! elevation statistics are 3D.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Tolerance under which two planar distances are considered equal.
pub const EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("geometry is empty")]
    Empty,
    #[error("line string needs at least 2 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("position {0} is outside [0, 1]")]
    InvalidPosition(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
pub struct Coord3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coord3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

impl From<(f64, f64, f64)> for Coord3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Geometry accepted as topology input: a point or a line string.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord3),
    LineString(Vec<Coord3>),
}

impl Geometry {
    pub fn coords(&self) -> &[Coord3] {
        match self {
            Geometry::Point(p) => std::slice::from_ref(p),
            Geometry::LineString(coords) => coords,
        }
    }

    pub fn geom_type(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
        }
    }
}

/// Distance between two points in 3D space.
pub fn distance_3d(a: &Coord3, b: &Coord3) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2) + (b.z - a.z).powi(2)).sqrt()
}

pub fn distance_2d(a: &Coord3, b: &Coord3) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Elevation profile of a 3D line: `(cumulative distance, elevation)` per vertex.
///
/// The first pair is always `(0.0, z0)`. Distances are straight 3D euclidean
/// distances between consecutive vertices. An empty input yields an empty
/// profile.
pub fn elevation_profile(coords: &[Coord3]) -> Vec<(f64, f64)> {
    let Some(first) = coords.first() else {
        return Vec::new();
    };

    let mut distance = 0.0;
    let mut profile = Vec::with_capacity(coords.len());
    profile.push((distance, first.z));
    for pair in coords.windows(2) {
        distance += distance_3d(&pair[0], &pair[1]);
        profile.push((distance, pair[1].z));
    }
    profile
}

pub fn length_3d(coords: &[Coord3]) -> f64 {
    coords.windows(2).map(|w| distance_3d(&w[0], &w[1])).sum()
}

pub fn length_2d(coords: &[Coord3]) -> f64 {
    coords.windows(2).map(|w| distance_2d(&w[0], &w[1])).sum()
}

/// Derived elevation figures of a path geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, TS)]
pub struct ElevationStats {
    pub length: f64,
    /// Sum of positive elevation differences, in metres.
    pub ascent: i64,
    /// Sum of negative elevation differences (zero or negative), in metres.
    pub descent: i64,
    pub min_elevation: i64,
    pub max_elevation: i64,
}

pub fn elevation_stats(coords: &[Coord3]) -> ElevationStats {
    if coords.is_empty() {
        return ElevationStats::default();
    }

    let mut ascent = 0.0;
    let mut descent = 0.0;
    for pair in coords.windows(2) {
        let dz = pair[1].z - pair[0].z;
        if dz > 0.0 {
            ascent += dz;
        } else {
            descent += dz;
        }
    }

    let min = coords.iter().map(|c| c.z).fold(f64::INFINITY, f64::min);
    let max = coords.iter().map(|c| c.z).fold(f64::NEG_INFINITY, f64::max);

    ElevationStats {
        length: length_3d(coords),
        ascent: ascent.round() as i64,
        descent: descent.round() as i64,
        min_elevation: min.round() as i64,
        max_elevation: max.round() as i64,
    }
}

/// `(xmin, ymin, xmax, ymax)` of a set of coordinates.
pub fn bounding_box<'a, I>(coords: I) -> Option<(f64, f64, f64, f64)>
where
    I: IntoIterator<Item = &'a Coord3>,
{
    coords.into_iter().fold(None, |acc, c| match acc {
        None => Some((c.x, c.y, c.x, c.y)),
        Some((xmin, ymin, xmax, ymax)) => {
            Some((xmin.min(c.x), ymin.min(c.y), xmax.max(c.x), ymax.max(c.y)))
        }
    })
}

/// Planar distance from `p` to segment `[a, b]`, with the clamped parameter of
/// the closest point along the segment.
pub fn distance_point_segment(p: &Coord3, a: &Coord3, b: &Coord3) -> (f64, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 <= EPSILON * EPSILON {
        return (distance_2d(p, a), 0.0);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    let closest = Coord3::xy(a.x + t * dx, a.y + t * dy);
    (distance_2d(p, &closest), t)
}

/// Fraction of the line's planar length at the point closest to `p`, and the
/// distance from `p` to the line.
pub fn line_locate_point(line: &[Coord3], p: &Coord3) -> Option<(f64, f64)> {
    match line {
        [] => None,
        [only] => Some((0.0, distance_2d(only, p))),
        _ => {
            let total = length_2d(line);
            let mut walked = 0.0;
            let mut best: Option<(f64, f64)> = None;
            for pair in line.windows(2) {
                let seg_len = distance_2d(&pair[0], &pair[1]);
                let (d, t) = distance_point_segment(p, &pair[0], &pair[1]);
                if best.is_none_or(|(_, best_d)| d < best_d - EPSILON) {
                    let along = walked + t * seg_len;
                    let fraction = if total > EPSILON { along / total } else { 0.0 };
                    best = Some((fraction, d));
                }
                walked += seg_len;
            }
            best
        }
    }
}

/// Point at `fraction` of the line's planar length; elevation is interpolated.
pub fn line_interpolate_point(line: &[Coord3], fraction: f64) -> Result<Coord3, GeometryError> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(GeometryError::InvalidPosition(fraction));
    }
    let first = line.first().ok_or(GeometryError::Empty)?;
    let total = length_2d(line);
    if line.len() == 1 || total <= EPSILON {
        return Ok(*first);
    }

    let target = fraction * total;
    let mut walked = 0.0;
    for pair in line.windows(2) {
        let seg_len = distance_2d(&pair[0], &pair[1]);
        if walked + seg_len >= target - EPSILON {
            let t = if seg_len > EPSILON {
                ((target - walked) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return Ok(lerp(&pair[0], &pair[1], t));
        }
        walked += seg_len;
    }
    Ok(line[line.len() - 1])
}

fn lerp(a: &Coord3, b: &Coord3, t: f64) -> Coord3 {
    Coord3::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
    )
}

/// Portion of the line between two fractions. When `start > end` the
/// substring is returned in reverse direction.
pub fn line_substring(line: &[Coord3], start: f64, end: f64) -> Result<Vec<Coord3>, GeometryError> {
    if start > end {
        let mut forward = line_substring(line, end, start)?;
        forward.reverse();
        return Ok(forward);
    }

    let from = line_interpolate_point(line, start)?;
    let to = line_interpolate_point(line, end)?;
    let total = length_2d(line);

    let mut result = vec![from];
    let mut walked = 0.0;
    for pair in line.windows(2) {
        walked += distance_2d(&pair[0], &pair[1]);
        if total <= EPSILON {
            break;
        }
        let fraction = walked / total;
        if fraction > start + EPSILON && fraction < end - EPSILON {
            result.push(pair[1]);
        }
    }
    if result.last() != Some(&to) || result.len() == 1 {
        result.push(to);
    }
    Ok(result)
}

fn orientation(a: &Coord3, b: &Coord3, c: &Coord3) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: &Coord3, b: &Coord3, p: &Coord3) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

pub fn segments_intersect(a: &Coord3, b: &Coord3, c: &Coord3, d: &Coord3) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if ((o1 > EPSILON && o2 < -EPSILON) || (o1 < -EPSILON && o2 > EPSILON))
        && ((o3 > EPSILON && o4 < -EPSILON) || (o3 < -EPSILON && o4 > EPSILON))
    {
        return true;
    }

    (o1.abs() <= EPSILON && on_segment(a, b, c))
        || (o2.abs() <= EPSILON && on_segment(a, b, d))
        || (o3.abs() <= EPSILON && on_segment(c, d, a))
        || (o4.abs() <= EPSILON && on_segment(c, d, b))
}

fn segments(coords: &[Coord3]) -> Vec<(Coord3, Coord3)> {
    match coords {
        [only] => vec![(*only, *only)],
        _ => coords.windows(2).map(|w| (w[0], w[1])).collect(),
    }
}

/// Minimum planar distance between two geometries; zero when they intersect.
pub fn distance_between(a: &Geometry, b: &Geometry) -> Result<f64, GeometryError> {
    let sa = segments(a.coords());
    let sb = segments(b.coords());
    if sa.is_empty() || sb.is_empty() {
        return Err(GeometryError::Empty);
    }

    let mut best = f64::INFINITY;
    for (a1, a2) in &sa {
        for (b1, b2) in &sb {
            if segments_intersect(a1, a2, b1, b2) {
                return Ok(0.0);
            }
            let candidates = [
                distance_point_segment(a1, b1, b2).0,
                distance_point_segment(a2, b1, b2).0,
                distance_point_segment(b1, a1, a2).0,
                distance_point_segment(b2, a1, a2).0,
            ];
            best = candidates.into_iter().fold(best, f64::min);
        }
    }
    Ok(best)
}

pub fn intersects(a: &Geometry, b: &Geometry) -> bool {
    distance_between(a, b).is_ok_and(|d| d <= EPSILON)
}
