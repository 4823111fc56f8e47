//! Great-circle distance filtering over the geo sub-field fast columns.

use tantivy::columnar::Column;
use tantivy::query::{EnableScoring, Explanation, Query, Scorer, Weight};
use tantivy::{DocId, DocSet, Score, SegmentReader, TantivyError, TERMINATED};

use searchbridge_core::document::GeoPoint;

pub const EARTH_MEAN_RADIUS_KM: f64 = 6_371.008_771_4;

/// Central angle in degrees subtended by `km` on the mean earth sphere.
pub fn km_to_degrees(km: f64) -> f64 {
    (km / EARTH_MEAN_RADIUS_KM).to_degrees()
}

/// Haversine distance in kilometers between two points.
pub fn haversine_km(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_KM * a.sqrt().asin()
}

/// Matches documents whose stored point lies within `distance_km` of
/// `center`. Evaluated by scanning the per-segment `{field}__x` and
/// `{field}__y` fast columns; segments without both columns match nothing.
#[derive(Debug, Clone)]
pub struct GeoDistanceQuery {
    x_field: String,
    y_field: String,
    center: GeoPoint,
    distance_km: f64,
}

impl GeoDistanceQuery {
    pub fn new(x_field: String, y_field: String, center: GeoPoint, distance_km: f64) -> Self {
        Self { x_field, y_field, center, distance_km }
    }
}

impl Query for GeoDistanceQuery {
    fn weight(&self, _enable_scoring: EnableScoring<'_>) -> tantivy::Result<Box<dyn Weight>> {
        Ok(Box::new(GeoDistanceWeight {
            x_field: self.x_field.clone(),
            y_field: self.y_field.clone(),
            center: self.center,
            distance_km: self.distance_km,
        }))
    }
}

struct GeoDistanceWeight {
    x_field: String,
    y_field: String,
    center: GeoPoint,
    distance_km: f64,
}

impl GeoDistanceWeight {
    fn matching_docs(&self, reader: &SegmentReader) -> tantivy::Result<Vec<DocId>> {
        let x: Option<Column<f64>> = reader.fast_fields().column_opt(&self.x_field)?;
        let y: Option<Column<f64>> = reader.fast_fields().column_opt(&self.y_field)?;
        let (Some(x), Some(y)) = (x, y) else {
            return Ok(Vec::new());
        };

        let mut docs = Vec::new();
        for doc in 0..reader.max_doc() {
            if let (Some(longitude), Some(latitude)) = (x.first(doc), y.first(doc)) {
                let point = GeoPoint::new(latitude, longitude);
                if haversine_km(&self.center, &point) <= self.distance_km {
                    docs.push(doc);
                }
            }
        }
        Ok(docs)
    }
}

impl Weight for GeoDistanceWeight {
    fn scorer(&self, reader: &SegmentReader, boost: Score) -> tantivy::Result<Box<dyn Scorer>> {
        let docs = self.matching_docs(reader)?;
        Ok(Box::new(GeoDistanceScorer { docs, cursor: 0, boost }))
    }

    fn explain(&self, reader: &SegmentReader, doc: DocId) -> tantivy::Result<Explanation> {
        if self.matching_docs(reader)?.contains(&doc) {
            Ok(Explanation::new("GeoDistanceQuery", 1.0))
        } else {
            Err(TantivyError::InvalidArgument(format!(
                "Document #({doc}) does not match"
            )))
        }
    }
}

struct GeoDistanceScorer {
    docs: Vec<DocId>,
    cursor: usize,
    boost: Score,
}

impl DocSet for GeoDistanceScorer {
    fn advance(&mut self) -> DocId {
        self.cursor += 1;
        self.doc()
    }

    fn doc(&self) -> DocId {
        self.docs.get(self.cursor).copied().unwrap_or(TERMINATED)
    }

    fn size_hint(&self) -> u32 {
        self.docs.len() as u32
    }
}

impl Scorer for GeoDistanceScorer {
    fn score(&mut self) -> Score {
        self.boost
    }
}
