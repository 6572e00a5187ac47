use serde::{Deserialize, Serialize};

use crate::{
    data::{CandidateTrack, Muon},
    Float,
};

/// The eleven displacement thresholds, in millimeters, in increasing order.
///
/// The thresholds are nested: a candidate inside threshold `i` is inside every
/// threshold `j > i`, so per-threshold counts and summed pt are monotonically
/// non-decreasing across this sequence.
pub const DISTANCE_THRESHOLDS_MM: [Float; 11] =
    [0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];

/// Number of exponents in the charge-weighted ratio curve.
pub const N_RATIO_EXPONENTS: usize = 10;

/// Tolerance on `|candidate pt − muon pt|` below which a candidate is taken to
/// be the muon's own track and excluded.
///
/// A proxy match, not an identity check: it can both over-exclude a distinct
/// track with coincidentally equal pt and under-exclude the muon's own track
/// under rounding. Kept as-is for output compatibility.
pub const SELF_MATCH_PT_TOLERANCE: Float = 1e-3;

/// Sentinel reported as the minimum halo pt when the halo is empty; callers
/// must guard on the halo being non-empty before deriving ranges.
pub const MIN_PT_SENTINEL: Float = 1e9;

/// Count and summed transverse momentum accumulated under one displacement
/// threshold.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    /// Number of candidates strictly inside the threshold.
    pub count: u32,
    /// Summed pt of those candidates.
    pub sum_pt: Float,
}

/// A candidate that survived validity and self-match filtering.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloTrack {
    /// Transverse momentum.
    pub pt: Float,
    /// Electric charge.
    pub charge: i32,
}

/// The output of the displacement clustering pass for one muon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HaloCluster {
    /// Per-threshold accumulations, indexed alongside
    /// [`DISTANCE_THRESHOLDS_MM`].
    pub buckets: [ThresholdBucket; 11],
    /// Every surviving candidate's `(pt, charge)`, regardless of distance.
    pub halo: Vec<HaloTrack>,
}

/// Cluster candidate tracks by 3-D distance from the muon's production point.
///
/// Candidates without track details are skipped, as is the candidate whose pt
/// matches the muon's within [`SELF_MATCH_PT_TOLERANCE`]. Each remaining
/// candidate contributes to every threshold bucket whose radius it falls
/// strictly inside, and to the unbounded halo list used downstream by
/// [`charge_weighted_curve`].
pub fn cluster_tracks(muon: &Muon, candidates: &[CandidateTrack]) -> HaloCluster {
    let mut cluster = HaloCluster::default();
    for candidate in candidates {
        if !candidate.has_track_details {
            continue;
        }
        if (candidate.pt - muon.pt).abs() < SELF_MATCH_PT_TOLERANCE {
            continue;
        }
        let distance = candidate.position.distance(&muon.production_point);
        for (bucket, threshold) in cluster.buckets.iter_mut().zip(DISTANCE_THRESHOLDS_MM) {
            if distance < threshold {
                bucket.count += 1;
                bucket.sum_pt += candidate.pt;
            }
        }
        cluster.halo.push(HaloTrack {
            pt: candidate.pt,
            charge: candidate.charge,
        });
    }
    cluster
}

/// The charge-weighted momentum-ratio curve and pt reductions over one halo.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioCurve {
    /// `ratios[i]` is the charge-weighted ratio at exponent `(i + 1) / 10`.
    pub ratios: [Float; N_RATIO_EXPONENTS],
    /// Summed halo pt.
    pub sum_pt: Float,
    /// Maximum halo pt, 0 for an empty halo.
    pub max_pt: Float,
    /// Minimum halo pt, [`MIN_PT_SENTINEL`] for an empty halo.
    pub min_pt: Float,
    /// Number of halo tracks the reductions ran over.
    pub n_tracks: usize,
}

impl Default for RatioCurve {
    fn default() -> Self {
        Self {
            ratios: [0.0; N_RATIO_EXPONENTS],
            sum_pt: 0.0,
            max_pt: 0.0,
            min_pt: MIN_PT_SENTINEL,
            n_tracks: 0,
        }
    }
}

impl RatioCurve {
    /// `max_pt / sum_pt`, 0 when the halo carries no pt.
    pub fn max_pt_ratio(&self) -> Float {
        if self.sum_pt > 0.0 {
            self.max_pt / self.sum_pt
        } else {
            0.0
        }
    }

    /// `max_pt − min_pt`, 0 for an empty halo.
    pub fn pt_range(&self) -> Float {
        if self.n_tracks == 0 {
            0.0
        } else {
            self.max_pt - self.min_pt
        }
    }

    /// Indicator (1.0/0.0) of any accumulated halo pt. Not a true ratio; the
    /// historical field name is kept for output compatibility.
    pub fn extra_pt_ratio(&self) -> Float {
        if self.sum_pt > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

/// Evaluate the ratio curve over a halo.
///
/// For each exponent `m = 0.1, 0.2, …, 1.0` the ratio is
/// `Σ(charge · pt^m) / Σ(pt^m)` when the denominator is positive, else 0.
/// Exponents are derived from integer indices so exactly ten values are
/// produced with no floating-step accumulation drift.
pub fn charge_weighted_curve(halo: &[HaloTrack]) -> RatioCurve {
    let mut curve = RatioCurve {
        n_tracks: halo.len(),
        ..Default::default()
    };
    for track in halo {
        curve.sum_pt += track.pt;
        curve.max_pt = curve.max_pt.max(track.pt);
        curve.min_pt = curve.min_pt.min(track.pt);
    }
    for index in 0..N_RATIO_EXPONENTS {
        let exponent = (index + 1) as Float * 0.1;
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for track in halo {
            let weight = track.pt.powf(exponent);
            numerator += track.charge as Float * weight;
            denominator += weight;
        }
        curve.ratios[index] = if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        };
    }
    curve
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::data::test_event;

    fn halo(tracks: &[(Float, i32)]) -> Vec<HaloTrack> {
        tracks
            .iter()
            .map(|(pt, charge)| HaloTrack {
                pt: *pt,
                charge: *charge,
            })
            .collect()
    }

    #[test]
    fn two_track_example() {
        // tracks at 0.3 mm (pt 5, +1) and 0.8 mm (pt 3, -1) around a pt-20 muon
        let event = test_event();
        let cluster = cluster_tracks(&event.muons[0], &event.tracks);
        assert_eq!(cluster.buckets[0].count, 1);
        assert_relative_eq!(cluster.buckets[0].sum_pt, 5.0);
        for bucket in &cluster.buckets[1..] {
            assert_eq!(bucket.count, 2);
            assert_relative_eq!(bucket.sum_pt, 8.0);
        }
        let curve = charge_weighted_curve(&cluster.halo);
        assert_relative_eq!(curve.ratios[N_RATIO_EXPONENTS - 1], 0.25);
        assert_relative_eq!(curve.sum_pt, 8.0);
        assert_relative_eq!(curve.max_pt, 5.0);
        assert_relative_eq!(curve.min_pt, 3.0);
    }

    #[test]
    fn counts_and_sums_are_monotone() {
        let event = test_event();
        let mut tracks = event.tracks.clone();
        tracks.push(crate::data::CandidateTrack {
            pt: 7.0,
            charge: 1,
            position: crate::Vec3::new(0.0, 0.0, 6.5),
            has_track_details: true,
        });
        let cluster = cluster_tracks(&event.muons[0], &tracks);
        for pair in cluster.buckets.windows(2) {
            assert!(pair[0].count <= pair[1].count);
            assert!(pair[0].sum_pt <= pair[1].sum_pt);
        }
    }

    #[test]
    fn invalid_and_self_matching_candidates_are_skipped() {
        let event = test_event();
        let muon = &event.muons[0];
        let tracks = vec![
            // no track details
            crate::data::CandidateTrack {
                pt: 4.0,
                charge: 1,
                position: crate::Vec3::new(0.1, 0.0, 0.0),
                has_track_details: false,
            },
            // proxy self-match: pt within 1e-3 of the muon's
            crate::data::CandidateTrack {
                pt: muon.pt + 5e-4,
                charge: -1,
                position: crate::Vec3::new(0.1, 0.0, 0.0),
                has_track_details: true,
            },
        ];
        let cluster = cluster_tracks(muon, &tracks);
        assert!(cluster.halo.is_empty());
        assert_eq!(cluster.buckets[10].count, 0);
        assert_relative_eq!(cluster.buckets[10].sum_pt, 0.0);
    }

    #[test]
    fn distant_candidates_still_enter_the_halo() {
        let event = test_event();
        let muon = &event.muons[0];
        let tracks = vec![crate::data::CandidateTrack {
            pt: 2.5,
            charge: 1,
            position: crate::Vec3::new(50.0, 0.0, 0.0),
            has_track_details: true,
        }];
        let cluster = cluster_tracks(muon, &tracks);
        assert_eq!(cluster.buckets[10].count, 0);
        assert_eq!(cluster.halo.len(), 1);
        assert_relative_eq!(cluster.halo[0].pt, 2.5);
    }

    #[test]
    fn empty_halo_is_safe() {
        let curve = charge_weighted_curve(&[]);
        assert_relative_eq!(curve.sum_pt, 0.0);
        assert_relative_eq!(curve.max_pt, 0.0);
        assert_relative_eq!(curve.min_pt, MIN_PT_SENTINEL);
        assert_eq!(curve.n_tracks, 0);
        for ratio in curve.ratios {
            assert_relative_eq!(ratio, 0.0);
        }
        assert_relative_eq!(curve.max_pt_ratio(), 0.0);
        assert_relative_eq!(curve.pt_range(), 0.0);
        assert_relative_eq!(curve.extra_pt_ratio(), 0.0);
    }

    #[test]
    fn ratios_are_bounded_by_unit_charge() {
        let curve = charge_weighted_curve(&halo(&[
            (5.0, 1),
            (3.0, -1),
            (1.5, 1),
            (0.7, 0),
            (11.0, -1),
        ]));
        for ratio in curve.ratios {
            assert!((-1.0..=1.0).contains(&ratio));
        }
    }

    #[test]
    fn single_track_ratios_equal_its_charge() {
        let curve = charge_weighted_curve(&halo(&[(4.2, -1)]));
        for ratio in curve.ratios {
            assert_relative_eq!(ratio, -1.0);
        }
        assert_relative_eq!(curve.max_pt_ratio(), 1.0);
        assert_relative_eq!(curve.pt_range(), 0.0);
        assert_relative_eq!(curve.extra_pt_ratio(), 1.0);
    }

    #[test]
    fn exactly_ten_exponents() {
        // integer-indexed exponents: the first is 0.1, the last is exactly 1.0
        let first = 1 as Float * 0.1;
        let last = N_RATIO_EXPONENTS as Float * 0.1;
        assert_relative_eq!(first, 0.1);
        assert_relative_eq!(last, 1.0);
    }
}
