use crate::error::GeometryError;
use crate::sampler::SampleArea;
use geo::{Area, BoundingRect, Centroid, Contains, EuclideanLength};
use geo::{Geometry, MultiPolygon, Point, Polygon, Rect};
use geojson::GeoJson;
use std::fs;
use std::path::Path;
use tracing::info;

/// An immutable sampling region: one or more polygons with holes, in
/// (longitude, latitude) coordinates.
#[derive(Debug, Clone)]
pub struct Region {
    name: String,
    geometry: MultiPolygon<f64>,
    bbox: Rect<f64>,
    centroid: Point<f64>,
    area: f64,
}

impl Region {
    pub fn new(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Result<Self, GeometryError> {
        let name = name.into();
        if geometry.0.is_empty() {
            return Err(GeometryError::NoPolygon(name));
        }

        let area = geometry.unsigned_area();
        // NaN coordinates poison the area, so test for "not positive" rather than "zero".
        if !(area > 0.0 && area.is_finite()) {
            return Err(GeometryError::Degenerate { name, area });
        }

        let (Some(bbox), Some(centroid)) = (geometry.bounding_rect(), geometry.centroid()) else {
            return Err(GeometryError::Degenerate { name, area });
        };

        Ok(Self {
            name,
            geometry,
            bbox,
            centroid,
            area,
        })
    }

    /// Parses a GeoJSON Geometry, Feature or FeatureCollection. Every
    /// Polygon and MultiPolygon found is merged into one region; other
    /// geometry kinds are ignored.
    pub fn from_geojson_str(name: impl Into<String>, input: &str) -> Result<Self, GeometryError> {
        let name = name.into();
        let geojson: GeoJson = input.parse()?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            GeoJson::Geometry(g) => vec![g],
            GeoJson::Feature(f) => f.geometry.into_iter().collect(),
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
        };

        let mut polygons = Vec::new();
        for geom in geometries {
            let geo_geom: Geometry<f64> = geom.value.try_into()?;
            collect_polygons(geo_geom, &mut polygons);
        }

        let region = Self::new(name, MultiPolygon::new(polygons))?;
        info!(
            "Loaded region '{}': {} polygon(s), area {:.6} sq. deg, perimeter {:.6} deg",
            region.name,
            region.geometry.0.len(),
            region.area,
            region.perimeter()
        );
        Ok(region)
    }

    pub fn from_path(name: impl Into<String>, path: &Path) -> Result<Self, GeometryError> {
        let content = fs::read_to_string(path).map_err(|source| GeometryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_geojson_str(name, &content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Total length of all rings, holes included.
    pub fn perimeter(&self) -> f64 {
        self.geometry
            .iter()
            .map(|poly| {
                poly.exterior().euclidean_length()
                    + poly.interiors().iter().map(|r| r.euclidean_length()).sum::<f64>()
            })
            .sum()
    }
}

impl SampleArea for Region {
    fn bounds(&self) -> Rect<f64> {
        self.bbox
    }

    fn centroid(&self) -> Point<f64> {
        self.centroid
    }

    fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.geometry.contains(&Point::new(longitude, latitude))
    }
}

fn collect_polygons(geom: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geom {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_polygons(g, out);
            }
        }
        _ => {} // points and lines carry no area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const SQUARE: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]]
    }"#;

    #[test]
    fn parses_bare_polygon() {
        let region = Region::from_geojson_str("square", SQUARE).unwrap();
        assert_eq!(region.name(), "square");
        assert!((region.area() - 100.0).abs() < 1e-9);
        assert!((region.perimeter() - 40.0).abs() < 1e-9);

        let bbox = region.bounds();
        assert_eq!((bbox.min().x, bbox.min().y), (0.0, 0.0));
        assert_eq!((bbox.max().x, bbox.max().y), (10.0, 10.0));

        let c = SampleArea::centroid(&region);
        assert!((c.x() - 5.0).abs() < 1e-9 && (c.y() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn parses_feature_collection_and_skips_points() {
        let input = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [50.0, 50.0]}},
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
                        [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]]]
                    ]
                }}
            ]
        }"#;
        let region = Region::from_geojson_str("pair", input).unwrap();
        assert_eq!(region.geometry().0.len(), 2);
        assert!((region.area() - 2.0).abs() < 1e-9);
        assert!(region.contains(0.5, 0.5));
        assert!(region.contains(5.5, 5.5));
        assert!(!region.contains(3.0, 3.0));
    }

    #[test]
    fn holes_are_excluded() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0)]],
        );
        let region = Region::new("donut", MultiPolygon::new(vec![poly])).unwrap();
        assert!(region.contains(1.0, 1.0));
        assert!(!region.contains(5.0, 5.0));
        assert!((region.area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Region::from_geojson_str("bad", "{ not json").unwrap_err();
        assert!(matches!(err, GeometryError::Parse(_)));
    }

    #[test]
    fn input_without_polygons_is_rejected() {
        let input = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        let err = Region::from_geojson_str("dot", input).unwrap_err();
        assert!(matches!(err, GeometryError::NoPolygon(name) if name == "dot"));
    }

    #[test]
    fn collapsed_ring_is_degenerate() {
        let input = r#"{
            "type": "Polygon",
            "coordinates": [[[3.0, 3.0], [3.0, 3.0], [3.0, 3.0], [3.0, 3.0]]]
        }"#;
        let err = Region::from_geojson_str("pin", input).unwrap_err();
        assert!(matches!(err, GeometryError::Degenerate { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Region::from_path("nowhere", Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, GeometryError::Io { .. }));
    }
}
