//! Polygon parsing, validation and clipping for incident affected areas.
//!
//! Affected areas arrive as GeoJSON in lon/lat degrees. Before any clipping
//! they are reprojected onto a Lambert cylindrical equal-area plane centred
//! on the analysed incidents, so every area computed here is in km².

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{coord, Area, BooleanOps, BoundingRect, Coord, Line, LineString, MapCoords, MultiPolygon, Polygon, Rect};
use geojson::GeoJson;
use thiserror::Error;

/// Mean Earth radius (IUGG).
pub(crate) const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Intersections smaller than 1 m² count as touching, not overlapping.
pub(crate) const MIN_OVERLAP_KM2: f64 = 1e-6;

const VERTEX_EPSILON_DEG: f64 = 1e-9;
const DEGENERATE_AREA_DEG2: f64 = 1e-14;
const COORD_DECIMALS: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("polygon has fewer than 3 distinct vertices or encloses no area")]
    DegeneratePolygon,
    #[error("polygon boundary crosses itself")]
    SelfIntersecting,
    #[error("polygon has a coordinate outside lon [-180, 180] / lat [-90, 90]")]
    InvalidCoordinate,
    #[error("affected area must be a GeoJSON Polygon")]
    UnsupportedGeometry,
    #[error("affected area is not valid GeoJSON")]
    MalformedGeoJson,
}

impl GeometryError {
    pub fn kind(self) -> &'static str {
        match self {
            Self::DegeneratePolygon => "DEGENERATE_POLYGON",
            Self::SelfIntersecting => "SELF_INTERSECTING",
            Self::InvalidCoordinate => "INVALID_COORDINATE",
            Self::UnsupportedGeometry => "UNSUPPORTED_GEOMETRY",
            Self::MalformedGeoJson => "MALFORMED_GEOJSON",
        }
    }
}

/// Parses a stored affected area: a bare Polygon geometry or a Feature wrapping one.
pub fn parse_affected_area(text: &str) -> Result<Polygon<f64>, GeometryError> {
    let geojson: GeoJson = text.parse().map_err(|_| GeometryError::MalformedGeoJson)?;
    let geometry = match geojson {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => feature.geometry.ok_or(GeometryError::UnsupportedGeometry)?,
        GeoJson::FeatureCollection(_) => return Err(GeometryError::UnsupportedGeometry),
    };

    match geometry.value {
        value @ geojson::Value::Polygon(_) => {
            Polygon::<f64>::try_from(value).map_err(|_| GeometryError::MalformedGeoJson)
        }
        _ => Err(GeometryError::UnsupportedGeometry),
    }
}

/// Rejects polygons the clipper cannot handle meaningfully.
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    let in_range = polygon
        .exterior()
        .coords()
        .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()))
        .all(|c| {
            c.x.is_finite()
                && c.y.is_finite()
                && (-180.0..=180.0).contains(&c.x)
                && (-90.0..=90.0).contains(&c.y)
        });
    if !in_range {
        return Err(GeometryError::InvalidCoordinate);
    }

    let ring = distinct_ring(polygon.exterior());
    if ring.len() < 3 {
        return Err(GeometryError::DegeneratePolygon);
    }

    let crossing = ring_crossing(&ring);
    if polygon.unsigned_area() < DEGENERATE_AREA_DEG2 {
        // A bowtie also cancels out to zero area.
        return Err(match crossing {
            Some(Crossing::Proper) => GeometryError::SelfIntersecting,
            _ => GeometryError::DegeneratePolygon,
        });
    }
    if crossing.is_some() {
        return Err(GeometryError::SelfIntersecting);
    }

    for hole in polygon.interiors() {
        let ring = distinct_ring(hole);
        if ring.len() < 3 {
            return Err(GeometryError::DegeneratePolygon);
        }
        if ring_crossing(&ring).is_some() {
            return Err(GeometryError::SelfIntersecting);
        }
    }
    Ok(())
}

/// Ring vertices with consecutive duplicates and the closing vertex removed.
fn distinct_ring(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &c in &ring.0 {
        if coords.last().map_or(true, |&last| !same_vertex(last, c)) {
            coords.push(c);
        }
    }
    while coords.len() > 1 && same_vertex(coords[0], coords[coords.len() - 1]) {
        coords.pop();
    }
    coords
}

#[inline]
fn same_vertex(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() < VERTEX_EPSILON_DEG && (a.y - b.y).abs() < VERTEX_EPSILON_DEG
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crossing {
    /// Two non-adjacent edges cross through each other's interiors.
    Proper,
    /// Edges touch at a vertex or run along each other.
    Touching,
}

fn ring_crossing(ring: &[Coord<f64>]) -> Option<Crossing> {
    let n = ring.len();
    let segments: Vec<Line<f64>> = (0..n).map(|i| Line::new(ring[i], ring[(i + 1) % n])).collect();
    let mut found = None;

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                // Neighbouring edges always share their joint vertex.
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { is_proper: true, .. }) => return Some(Crossing::Proper),
                Some(_) => found = Some(Crossing::Touching),
            }
        }
    }
    found
}

/// Lambert cylindrical equal-area projection with its standard parallel at
/// the centre of the analysed polygons. Distortion is negligible at
/// sub-district extents and areas are preserved exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualAreaProjection {
    lon0: f64,
    sin_lat0: f64,
    cos_lat0: f64,
}

impl EqualAreaProjection {
    pub fn new(lon0: f64, lat0: f64) -> Self {
        let lat0 = lat0.to_radians();
        Self {
            lon0,
            sin_lat0: lat0.sin(),
            cos_lat0: lat0.cos().max(1e-6),
        }
    }

    /// Centres the projection on the combined bounding box of `polygons`.
    pub fn centred_on<'a, I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = &'a Polygon<f64>>,
    {
        let bounds = polygons
            .into_iter()
            .filter_map(|p| p.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            });

        match bounds {
            Some(rect) => {
                let centre = rect.center();
                Self::new(centre.x, centre.y)
            }
            None => Self::new(0.0, 0.0),
        }
    }

    pub fn forward(&self, c: Coord<f64>) -> Coord<f64> {
        coord! {
            x: EARTH_RADIUS_KM * self.cos_lat0 * (c.x - self.lon0).to_radians(),
            y: EARTH_RADIUS_KM * (c.y.to_radians().sin() - self.sin_lat0) / self.cos_lat0,
        }
    }

    pub fn inverse(&self, c: Coord<f64>) -> Coord<f64> {
        let sin_lat = (c.y * self.cos_lat0 / EARTH_RADIUS_KM + self.sin_lat0).clamp(-1.0, 1.0);
        coord! {
            x: self.lon0 + (c.x / (EARTH_RADIUS_KM * self.cos_lat0)).to_degrees(),
            y: sin_lat.asin().to_degrees(),
        }
    }

    /// Returns a new polygon in projected kilometres.
    pub fn project(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        let projection = *self;
        polygon.map_coords(move |c| projection.forward(c))
    }

    /// Converts a projected polygon back into GeoJSON-style lon/lat rings,
    /// exterior first.
    pub fn unproject_rings(&self, polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(|ring| {
                ring.coords()
                    .map(|&c| {
                        let lonlat = self.inverse(c);
                        [round_coord(lonlat.x), round_coord(lonlat.y)]
                    })
                    .collect()
            })
            .collect()
    }
}

#[inline]
fn round_coord(v: f64) -> f64 {
    (v * COORD_DECIMALS).round() / COORD_DECIMALS
}

/// A validated incident polygon in projected kilometres.
#[derive(Debug, Clone)]
pub struct Footprint {
    /// Index of the owning incident in the analysed set.
    pub incident: usize,
    pub polygon: Polygon<f64>,
}

/// Intersects two projected polygons. A non-convex intersection may split
/// into several pieces; slivers below [`MIN_OVERLAP_KM2`] are dropped.
pub fn overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> Vec<Polygon<f64>> {
    a.intersection(b)
        .into_iter()
        .filter(|piece| piece.unsigned_area() >= MIN_OVERLAP_KM2)
        .collect()
}

/// Total area in km² of projected pieces.
pub fn area_km2(pieces: &[Polygon<f64>]) -> f64 {
    pieces.iter().map(Area::unsigned_area).sum()
}

/// Unions projected polygons, returning each disjoint part separately.
pub fn union_all<'a, I>(polygons: I) -> Vec<Polygon<f64>>
where
    I: IntoIterator<Item = &'a Polygon<f64>>,
{
    polygons
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
            acc.union(&MultiPolygon::new(vec![polygon.clone()]))
        })
        .into_iter()
        .filter(|part| part.unsigned_area() >= MIN_OVERLAP_KM2)
        .collect()
}

/// Area shared by every polygon, returning each disjoint part separately.
pub fn common_area<'a, I>(polygons: I) -> Vec<Polygon<f64>>
where
    I: IntoIterator<Item = &'a Polygon<f64>>,
{
    let mut polygons = polygons.into_iter();
    let Some(first) = polygons.next() else {
        return Vec::new();
    };

    polygons
        .fold(MultiPolygon::new(vec![first.clone()]), |acc, polygon| {
            acc.intersection(&MultiPolygon::new(vec![polygon.clone()]))
        })
        .into_iter()
        .filter(|part| part.unsigned_area() >= MIN_OVERLAP_KM2)
        .collect()
}
