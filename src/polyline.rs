//! Route geometry as a decoded coordinate sequence.
//!
//! Stores latitude/longitude points directly for internal processing.
//! Encoding to/from compact polyline formats belongs at API boundaries,
//! not inside the planner.

use serde::{Deserialize, Serialize};

/// A route geometry as decoded (latitude, longitude) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Stitches consecutive route legs into one geometry.
    ///
    /// Routing providers return one line string per leg; the last point of
    /// a leg repeats as the first point of the next, so duplicated joints
    /// are dropped.
    pub fn from_segments(segments: Vec<Vec<(f64, f64)>>) -> Self {
        let mut points: Vec<(f64, f64)> = Vec::new();
        for segment in segments {
            for point in segment {
                if points.last() == Some(&point) {
                    continue;
                }
                points.push(point);
            }
        }
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_and_points() {
        let points = vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.points(), &points[..]);
        assert_eq!(polyline.len(), 3);
    }

    #[test]
    fn from_segments_drops_duplicated_joints() {
        let legs = vec![
            vec![(1.0, 1.0), (2.0, 2.0)],
            vec![(2.0, 2.0), (3.0, 3.0)],
            vec![(3.0, 3.0), (4.0, 4.0)],
        ];
        let polyline = Polyline::from_segments(legs);
        assert_eq!(
            polyline.points(),
            &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]
        );
    }

    #[test]
    fn from_segments_keeps_distinct_consecutive_points() {
        let legs = vec![vec![(1.0, 1.0)], vec![(2.0, 2.0)]];
        let polyline = Polyline::from_segments(legs);
        assert_eq!(polyline.len(), 2);
    }

    #[test]
    fn empty_polyline() {
        let polyline = Polyline::new(vec![]);
        assert!(polyline.is_empty());
        assert!(Polyline::from_segments(vec![]).is_empty());
    }

    #[test]
    fn into_points_round_trip() {
        let points = vec![(38.5, -120.2), (40.7, -120.95)];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.into_points(), points);
    }
}
