//! Waypoint track and the progress metric.
use crate::{
    base::{SpawnPoint, Vector3},
    PitlaneError,
};

/// Number of points preceding the spawn point dropped from a freshly assigned track.
///
/// Without the cut, an agent reversing off its spawn point would find itself
/// right next to the end of the track.
pub const DEFAULT_TAIL_CUT: usize = 20;

/// Scale of the normalized distance to finish.
pub const PROGRESS_SCALE: f64 = 10_000.0;

/// An ordered, cyclic sequence of 3D points an agent should follow.
///
/// The sequence is rotated so that index 0 is the spawn point of the agent. Only
/// positions are kept; the yaw of the source points is dropped, so waypoint
/// following can only reason about reachable positions, not headings.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointTrack {
    source: Vec<SpawnPoint>,
    spawn_index: usize,
    points: Vec<Vector3>,
    initial_distance: f64,
}

impl WaypointTrack {
    /// Builds a track starting at `spawn_index` of `source`, dropping the
    /// `tail_cut` points right before the spawn point.
    ///
    /// At least two points are kept regardless of `tail_cut`.
    pub fn from_spawn_points(
        source: &[SpawnPoint],
        spawn_index: usize,
        tail_cut: usize,
    ) -> Result<Self, PitlaneError> {
        let mut points = Self::rotated(source, spawn_index)?;
        let keep = points.len().saturating_sub(tail_cut).max(2);
        points.truncate(keep);
        Self::build(source.to_vec(), spawn_index, points)
    }

    /// Builds a track traversing all of `source`, starting at `spawn_index`.
    pub fn new(source: &[SpawnPoint], spawn_index: usize) -> Result<Self, PitlaneError> {
        let points = Self::rotated(source, spawn_index)?;
        Self::build(source.to_vec(), spawn_index, points)
    }

    fn build(
        source: Vec<SpawnPoint>,
        spawn_index: usize,
        points: Vec<Vector3>,
    ) -> Result<Self, PitlaneError> {
        let initial_distance = path_length(&points);
        if initial_distance <= 0.0 {
            return Err(PitlaneError::InvalidTrack(
                "all points of the track coincide".to_string(),
            ));
        }
        Ok(Self {
            source,
            spawn_index,
            points,
            initial_distance,
        })
    }

    fn rotated(source: &[SpawnPoint], spawn_index: usize) -> Result<Vec<Vector3>, PitlaneError> {
        if source.len() < 2 {
            return Err(PitlaneError::InvalidTrack(format!(
                "a track needs at least 2 points, got {}",
                source.len()
            )));
        }
        if spawn_index >= source.len() {
            return Err(PitlaneError::InvalidTrack(format!(
                "spawn index {} out of range for {} points",
                spawn_index,
                source.len()
            )));
        }
        Ok(source[spawn_index..]
            .iter()
            .chain(source[..spawn_index].iter())
            .map(SpawnPoint::location)
            .collect())
    }

    /// Re-orders the track so that traversal proceeds forward from
    /// `spawn_index` of the source points, wrapping cyclically.
    ///
    /// The rotation is always taken from the source sequence, so rotating twice
    /// with the same index leaves the track unchanged.
    pub fn rotate(&mut self, spawn_index: usize) -> Result<(), PitlaneError> {
        let points = Self::rotated(&self.source, spawn_index)?;
        *self = Self::build(self.source.clone(), spawn_index, points)?;
        Ok(())
    }

    /// Points of the track, starting at the spawn point.
    pub fn points(&self) -> &[Vector3] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`, a track has at least two points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the spawn point in the source sequence.
    pub fn spawn_index(&self) -> usize {
        self.spawn_index
    }

    /// Length of the track measured from the spawn point.
    pub fn initial_distance(&self) -> f64 {
        self.initial_distance
    }

    /// Returns the index of the nearest point and the distances to all points.
    ///
    /// Ties resolve to the first index achieving the minimum.
    pub fn closest_point_and_distances(&self, location: &Vector3) -> (usize, Vec<f64>) {
        let dists: Vec<f64> = self.points.iter().map(|p| p.distance(location)).collect();
        let mut closest = 0;
        for (i, d) in dists.iter().enumerate() {
            if *d < dists[closest] {
                closest = i;
            }
        }
        (closest, dists)
    }

    /// Sum of segment lengths from the point nearest to `location` to the end.
    pub fn remaining_length(&self, location: &Vector3) -> f64 {
        let (closest, _) = self.closest_point_and_distances(location);
        path_length(&self.points[closest..])
    }

    /// Remaining length as a proportion of the whole track, scaled to `0..=10000`.
    pub fn distance_to_finish(&self, location: &Vector3) -> f64 {
        self.remaining_length(location) / self.initial_distance * PROGRESS_SCALE
    }
}

fn path_length(points: &[Vector3]) -> f64 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<SpawnPoint> {
        (0..n)
            .map(|i| SpawnPoint::new(i as f64, 0.0, 0.0, 0.0))
            .collect()
    }

    fn circle(n: usize) -> Vec<SpawnPoint> {
        (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                SpawnPoint::new(50.0 * t.cos(), 50.0 * t.sin(), 0.5, t.to_degrees() + 90.0)
            })
            .collect()
    }

    #[test_log::test]
    fn exact_point_lookup() {
        let track = WaypointTrack::new(&circle(40), 0).unwrap();
        for (i, p) in track.points().iter().enumerate() {
            let (closest, dists) = track.closest_point_and_distances(p);
            assert_eq!(closest, i);
            assert_eq!(dists[i], 0.0);
            assert_eq!(dists.len(), 40);
        }
    }

    #[test_log::test]
    fn ties_resolve_to_first_index() {
        let track = WaypointTrack::new(&line(3), 0).unwrap();
        let (closest, dists) = track.closest_point_and_distances(&Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(dists[0], dists[1]);
        assert_eq!(closest, 0);
    }

    #[test_log::test]
    fn distance_to_finish_decreases_along_track() {
        let track = WaypointTrack::new(&circle(100), 17).unwrap();
        let mut prev = f64::INFINITY;
        for p in track.points() {
            let d = track.distance_to_finish(p);
            assert!(d <= prev);
            prev = d;
        }
        assert_eq!(prev, 0.0);
        let first = track.distance_to_finish(&track.points()[0]);
        assert!((first - PROGRESS_SCALE).abs() < 1e-9);
    }

    #[test_log::test]
    fn rotation_keeps_length_and_wraps() {
        let source = line(10);
        let track = WaypointTrack::new(&source, 7).unwrap();
        assert_eq!(track.len(), 10);
        assert_eq!(track.points()[0], source[7].location());
        assert_eq!(track.points()[3], source[0].location());
        assert_eq!(track.points()[9], source[6].location());
    }

    #[test_log::test]
    fn rotation_is_idempotent() {
        let mut track = WaypointTrack::new(&circle(30), 0).unwrap();
        track.rotate(12).unwrap();
        let once = track.clone();
        track.rotate(12).unwrap();
        assert_eq!(track, once);
        assert_eq!(track.spawn_index(), 12);
    }

    #[test_log::test]
    fn tail_cut_drops_points_before_spawn() {
        let source = line(50);
        let track = WaypointTrack::from_spawn_points(&source, 30, DEFAULT_TAIL_CUT).unwrap();
        assert_eq!(track.len(), 30);
        assert_eq!(track.points()[0], source[30].location());
        assert_eq!(track.points()[29], source[9].location());

        let short = WaypointTrack::from_spawn_points(&line(5), 0, DEFAULT_TAIL_CUT).unwrap();
        assert_eq!(short.len(), 2);
    }

    #[test_log::test]
    fn invalid_tracks_are_rejected() {
        assert!(WaypointTrack::new(&line(1), 0).is_err());
        assert!(WaypointTrack::new(&line(4), 4).is_err());
        let same = vec![SpawnPoint::new(1.0, 1.0, 1.0, 0.0); 3];
        assert!(matches!(
            WaypointTrack::new(&same, 0),
            Err(PitlaneError::InvalidTrack(_))
        ));
    }
}
