use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    truth::{StatusFlags, TruthCollection, TruthParticle, TruthRef},
    utils::vectors::Vec3,
    Float,
};

/// The best-fit track attached to a reconstructed muon.
///
/// Carries a point on the track and the track direction, from which the
/// impact parameters relative to an arbitrary reference point follow via the
/// standard linearized definitions.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestTrack {
    /// A point on the track (millimeters).
    pub position: Vec3,
    /// Track azimuth at that point.
    pub phi: Float,
    /// Track pseudorapidity at that point.
    pub eta: Float,
}

impl BestTrack {
    /// Signed transverse impact parameter relative to `point`.
    pub fn dxy(&self, point: &Vec3) -> Float {
        -(self.position.x() - point.x()) * self.phi.sin()
            + (self.position.y() - point.y()) * self.phi.cos()
    }

    /// Longitudinal impact parameter relative to `point`.
    pub fn dz(&self, point: &Vec3) -> Float {
        (self.position.z() - point.z())
            - ((self.position.x() - point.x()) * self.phi.cos()
                + (self.position.y() - point.y()) * self.phi.sin())
                * self.eta.sinh()
    }
}

/// A reconstructed muon, snapshotted read-only for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Muon {
    /// Transverse momentum.
    pub pt: Float,
    /// Pseudorapidity.
    pub eta: Float,
    /// Azimuthal angle.
    pub phi: Float,
    /// Electric charge.
    pub charge: i32,
    /// Production point (millimeters).
    pub production_point: Vec3,
    /// Whether the muon was reconstructed as a tracker muon.
    pub is_tracker: bool,
    /// The best-fit track, when one exists.
    pub best_track: Option<BestTrack>,
    /// Weak link to the matched truth particle, when one exists.
    pub truth_match: Option<TruthRef>,
}

/// A candidate track considered for the displacement halo around each muon.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    /// Transverse momentum.
    pub pt: Float,
    /// Electric charge.
    pub charge: i32,
    /// Track position (millimeters).
    pub position: Vec3,
    /// Whether track details were reconstructed; candidates without them are
    /// excluded from clustering.
    pub has_track_details: bool,
}

/// A reconstructed vertex.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Vertex position (millimeters).
    pub position: Vec3,
}

/// All input collections for one event, owned as immutable snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Reconstructed muons; the ordering defines the truth-linked `index`.
    pub muons: Vec<Muon>,
    /// Candidate tracks; ordering is irrelevant to the results.
    pub tracks: Vec<CandidateTrack>,
    /// Reconstructed vertices; only the first is used.
    pub vertices: Vec<Vertex>,
    /// Generator-truth particle arena.
    pub truth: TruthCollection,
}

impl EventData {
    /// The first vertex of the input collection, or a default zero-position
    /// vertex when the collection is empty.
    pub fn primary_vertex(&self) -> Vertex {
        self.vertices.first().copied().unwrap_or_default()
    }
}

impl Display for EventData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event:")?;
        writeln!(f, "  muons: {}", self.muons.len())?;
        writeln!(f, "  candidate tracks: {}", self.tracks.len())?;
        writeln!(f, "  vertices: {}", self.vertices.len())?;
        writeln!(f, "  truth particles: {}", self.truth.len())?;
        Ok(())
    }
}

/// An event that can be used to test feature extraction end to end: one
/// tracker muon at the origin with a signal-like truth match, and two valid
/// candidate tracks 0.3 mm and 0.8 mm away.
pub fn test_event() -> EventData {
    let mut truth = TruthCollection::new();
    let z_boson = truth.push(TruthParticle {
        pdg_id: 23,
        status: 22,
        pt: 0.0,
        eta: 0.0,
        phi: 0.0,
        vertex: Vec3::default(),
        flags: StatusFlags::new(StatusFlags::HARD_PROCESS),
        mother: None,
    });
    let gen_muon = truth.push(TruthParticle {
        pdg_id: 13,
        status: 1,
        pt: 20.0,
        eta: 0.5,
        phi: 1.0,
        vertex: Vec3::default(),
        flags: StatusFlags::new(
            StatusFlags::PROMPT | StatusFlags::FROM_HARD_PROCESS | StatusFlags::LAST_COPY,
        ),
        mother: Some(z_boson),
    });
    EventData {
        muons: vec![Muon {
            pt: 20.0,
            eta: 0.5,
            phi: 1.0,
            charge: -1,
            production_point: Vec3::default(),
            is_tracker: true,
            best_track: Some(BestTrack {
                position: Vec3::new(0.0, 0.0, 0.1),
                phi: 1.0,
                eta: 0.5,
            }),
            truth_match: Some(gen_muon),
        }],
        tracks: vec![
            CandidateTrack {
                pt: 5.0,
                charge: 1,
                position: Vec3::new(0.3, 0.0, 0.0),
                has_track_details: true,
            },
            CandidateTrack {
                pt: 3.0,
                charge: -1,
                position: Vec3::new(0.0, 0.8, 0.0),
                has_track_details: true,
            },
        ],
        vertices: vec![Vertex::default()],
        truth,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn primary_vertex_defaults_to_origin() {
        let event = EventData::default();
        assert_eq!(event.primary_vertex(), Vertex::default());
        let event = test_event();
        assert_eq!(event.primary_vertex().position, Vec3::default());
    }

    #[test]
    fn impact_parameters_at_reference_point() {
        // a track passing through the reference point has vanishing d0 and dz
        let track = BestTrack {
            position: Vec3::new(1.0, 2.0, 3.0),
            phi: 0.7,
            eta: -0.3,
        };
        let on_track = track.position;
        assert_relative_eq!(track.dxy(&on_track), 0.0);
        assert_relative_eq!(track.dz(&on_track), 0.0);
    }

    #[test]
    fn impact_parameters_axis_aligned() {
        // track along +x through (0, 1, 0): d0 w.r.t. the origin is the
        // perpendicular offset, dz the longitudinal one
        let track = BestTrack {
            position: Vec3::new(0.0, 1.0, 2.0),
            phi: 0.0,
            eta: 0.0,
        };
        let origin = Vec3::default();
        assert_relative_eq!(track.dxy(&origin), 1.0);
        assert_relative_eq!(track.dz(&origin), 2.0);
    }

    #[test]
    fn test_event_is_well_formed() {
        let event = test_event();
        assert_eq!(event.muons.len(), 1);
        let muon = &event.muons[0];
        assert!(muon.is_tracker);
        assert!(muon.best_track.is_some());
        let truth = event.truth.get(muon.truth_match.unwrap()).unwrap();
        assert!(truth.is_signal_muon());
        assert_relative_eq!(event.tracks[0].position.distance(&muon.production_point), 0.3);
        assert_relative_eq!(event.tracks[1].position.distance(&muon.production_point), 0.8);
    }
}
