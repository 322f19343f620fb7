use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::geometry::{Point, PointFeature, Polygon};

type F64 = OrderedFloat<f64>;

/// Reasons a (point, polygon) pair yields no tangents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TangentError {
    #[error("polygon '{id}': ring has {n} vertices, at least 3 required")]
    InvalidRing { id: String, n: usize },
    #[error("polygon '{id}': {n} rings supplied, split multi-part polygons first")]
    InvalidPolygon { id: String, n: usize },
}

/// A tangent sight line from a star point to one polygon vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// The star point the sight line starts from.
    pub start: Point,
    /// The selected polygon vertex.
    pub end: Point,
    /// Degrees clockwise from north, in [0, 360).
    pub azimuth: f64,
    /// `"<point-id>_<polygon-id>"` of the pair that produced this segment.
    pub label: String,
}

/// The two extreme sight lines of one (point, polygon) pair.
///
/// The segments coincide when every ring vertex lies on a single bearing
/// from the star.
#[derive(Debug, Clone, PartialEq)]
pub struct TangentPair {
    pub max: Segment,
    pub min: Segment,
}

impl TangentPair {
    /// Whether both extrema collapsed onto one bearing.
    pub fn is_degenerate(&self) -> bool {
        self.max.azimuth == self.min.azimuth
    }
}

/// Azimuth of one ring vertex. `inverse` flips the measuring direction:
/// vertex to star by default, star to vertex when set. Some point/polygon
/// arrangements need the flipped direction to produce usable tangents, and
/// the caller has to know which one its data requires.
fn vertex_azimuth(star: Point, vertex: Point, inverse: bool) -> f64 {
    if inverse {
        star.azimuth(&vertex)
    } else {
        vertex.azimuth(&star)
    }
}

/// Finds the two tangents from `star` to `polygon`: the vertices attaining
/// the maximum and the minimum azimuth delimit the star's sight cone onto
/// the ring. When several vertices share an extremal azimuth, the one
/// earliest in ring order wins; comparison is exact, with no epsilon.
pub fn find_tangents(
    star: &PointFeature,
    polygon: &Polygon,
    inverse: bool,
) -> Result<TangentPair, TangentError> {
    if polygon.rings.len() != 1 {
        return Err(TangentError::InvalidPolygon {
            id: polygon.id.clone(),
            n: polygon.rings.len(),
        });
    }
    let vertices = polygon.rings[0].open_vertices();
    if vertices.len() < 3 {
        return Err(TangentError::InvalidRing {
            id: polygon.id.clone(),
            n: vertices.len(),
        });
    }

    let azimuths: Vec<F64> = vertices
        .iter()
        .map(|&v| OrderedFloat(vertex_azimuth(star.pos, v, inverse)))
        .collect();

    // Strict comparisons keep the first vertex attaining each extremum.
    let mut max_i = 0;
    let mut min_i = 0;
    for (i, &az) in azimuths.iter().enumerate().skip(1) {
        if az > azimuths[max_i] {
            max_i = i;
        }
        if az < azimuths[min_i] {
            min_i = i;
        }
    }

    let label = format!("{}_{}", star.id, polygon.id);
    Ok(TangentPair {
        max: Segment {
            start: star.pos,
            end: vertices[max_i],
            azimuth: azimuths[max_i].0,
            label: label.clone(),
        },
        min: Segment {
            start: star.pos,
            end: vertices[min_i],
            azimuth: azimuths[min_i].0,
            label,
        },
    })
}
