use indexmap::IndexMap;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::{charge_weighted_curve, cluster_tracks, HaloCluster, RatioCurve, N_RATIO_EXPONENTS},
    config::ProducerConfig,
    data::{EventData, Muon},
    truth::TruthParticle,
    utils::enums::MuonCategory,
    Float, MuhaloResult,
};

use self::io::FeatureSink;

/// Feature-row sinks and the Parquet columnar writer.
pub mod io;

/// One output row: every feature computed for a single accepted muon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuonFeatureRecord {
    /// Transverse momentum.
    pub pt: Float,
    /// Pseudorapidity.
    pub eta: Float,
    /// Azimuthal angle.
    pub phi: Float,
    /// Longitudinal impact parameter relative to the primary vertex.
    pub dz: Float,
    /// Transverse impact parameter relative to the primary vertex.
    pub d0: Float,
    /// Euclidean norm of the two impact parameters.
    pub impact_factor: Float,
    /// Electric charge.
    pub charge: i32,
    /// Halo-track count under each displacement threshold.
    pub extra_tracks: [u32; 11],
    /// Summed halo pt under each displacement threshold.
    pub sum_extra_track_pt: [Float; 11],
    /// Charge-weighted ratio at each exponent.
    pub charge_weighted_ratios: [Float; N_RATIO_EXPONENTS],
    /// Maximum halo pt over summed halo pt.
    pub max_pt_ratio: Float,
    /// Spread between the maximum and minimum halo pt.
    pub pt_range: Float,
    /// Summed pt of the full halo.
    pub sum_extra_pt: Float,
    /// Indicator (1.0/0.0) of any accumulated halo pt.
    pub extra_pt_ratio: Float,
}

impl MuonFeatureRecord {
    /// Assemble a record from the clustering and ratio-curve outputs.
    pub fn build(
        muon: &Muon,
        dz: Float,
        d0: Float,
        cluster: &HaloCluster,
        curve: &RatioCurve,
    ) -> Self {
        let mut extra_tracks = [0u32; 11];
        let mut sum_extra_track_pt = [0.0; 11];
        for (index, bucket) in cluster.buckets.iter().enumerate() {
            extra_tracks[index] = bucket.count;
            sum_extra_track_pt[index] = bucket.sum_pt;
        }
        Self {
            pt: muon.pt,
            eta: muon.eta,
            phi: muon.phi,
            dz,
            d0,
            impact_factor: d0.hypot(dz),
            charge: muon.charge,
            extra_tracks,
            sum_extra_track_pt,
            charge_weighted_ratios: curve.ratios,
            max_pt_ratio: curve.max_pt_ratio(),
            pt_range: curve.pt_range(),
            sum_extra_pt: curve.sum_pt,
            extra_pt_ratio: curve.extra_pt_ratio(),
        }
    }
}

/// Parallel per-category output arrays; within one category the i-th entry of
/// every array describes the same muon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryColumns {
    /// Transverse momenta.
    pub pt: Vec<Float>,
    /// Pseudorapidities.
    pub eta: Vec<Float>,
    /// Azimuthal angles.
    pub phi: Vec<Float>,
    /// Longitudinal impact parameters.
    pub dz: Vec<Float>,
    /// Transverse impact parameters.
    pub d0: Vec<Float>,
    /// Impact factors.
    pub impact_factor: Vec<Float>,
    /// Electric charges.
    pub charge: Vec<i32>,
    /// Halo-track counts, one array per displacement threshold.
    pub extra_tracks: [Vec<u32>; 11],
    /// Summed halo pt, one array per displacement threshold.
    pub sum_extra_track_pt: [Vec<Float>; 11],
    /// Charge-weighted ratios, one array per exponent.
    pub charge_weighted_ratio: [Vec<Float>; N_RATIO_EXPONENTS],
    /// Maximum-pt ratios.
    pub max_pt_ratio: Vec<Float>,
    /// Halo pt spreads.
    pub pt_range: Vec<Float>,
    /// Summed halo pt.
    pub sum_extra_pt: Vec<Float>,
    /// Halo pt indicators.
    pub extra_pt_ratio: Vec<Float>,
}

impl CategoryColumns {
    /// Number of muons appended to this category.
    pub fn len(&self) -> usize {
        self.pt.len()
    }

    /// Whether this category holds no muons.
    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }

    fn clear(&mut self) {
        self.pt.clear();
        self.eta.clear();
        self.phi.clear();
        self.dz.clear();
        self.d0.clear();
        self.impact_factor.clear();
        self.charge.clear();
        self.extra_tracks.iter_mut().for_each(Vec::clear);
        self.sum_extra_track_pt.iter_mut().for_each(Vec::clear);
        self.charge_weighted_ratio.iter_mut().for_each(Vec::clear);
        self.max_pt_ratio.clear();
        self.pt_range.clear();
        self.sum_extra_pt.clear();
        self.extra_pt_ratio.clear();
    }

    fn push(&mut self, record: &MuonFeatureRecord) {
        self.pt.push(record.pt);
        self.eta.push(record.eta);
        self.phi.push(record.phi);
        self.dz.push(record.dz);
        self.d0.push(record.d0);
        self.impact_factor.push(record.impact_factor);
        self.charge.push(record.charge);
        for (column, value) in self.extra_tracks.iter_mut().zip(record.extra_tracks) {
            column.push(value);
        }
        for (column, value) in self
            .sum_extra_track_pt
            .iter_mut()
            .zip(record.sum_extra_track_pt)
        {
            column.push(value);
        }
        for (column, value) in self
            .charge_weighted_ratio
            .iter_mut()
            .zip(record.charge_weighted_ratios)
        {
            column.push(value);
        }
        self.max_pt_ratio.push(record.max_pt_ratio);
        self.pt_range.push(record.pt_range);
        self.sum_extra_pt.push(record.sum_extra_pt);
        self.extra_pt_ratio.push(record.extra_pt_ratio);
    }
}

/// The truth-linked parallel record: reco and matched-truth kinematics plus
/// classification booleans, indexed by reco-muon position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruthMatchColumns {
    /// Position in the unfiltered reco muon list; advances across skipped
    /// muons so entries stay aligned with the input collection.
    pub index: Vec<u32>,
    /// Reco transverse momenta.
    pub pt: Vec<Float>,
    /// Reco pseudorapidities.
    pub eta: Vec<Float>,
    /// Reco azimuthal angles.
    pub phi: Vec<Float>,
    /// Matched-truth transverse momenta.
    pub gen_pt: Vec<Float>,
    /// Matched-truth pseudorapidities.
    pub gen_eta: Vec<Float>,
    /// Matched-truth azimuthal angles.
    pub gen_phi: Vec<Float>,
    /// Matched-truth PDG identifiers.
    pub gen_pdg_id: Vec<i32>,
    /// Matched-truth status codes.
    pub gen_status: Vec<i32>,
    /// Signal classification (prompt, hard-process, muon, final-state).
    pub is_signal: Vec<bool>,
    /// Pileup classification (flags or displacement).
    pub is_pileup: Vec<bool>,
    /// Raw prompt flag bit.
    pub is_prompt: Vec<bool>,
    /// Raw from-hard-process flag bit.
    pub from_hard_process: Vec<bool>,
    /// Strict-ancestors photon-descent check.
    pub has_photon_mother: Vec<bool>,
}

impl TruthMatchColumns {
    /// Number of truth-linked rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no truth-linked rows were appended.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn clear(&mut self) {
        self.index.clear();
        self.pt.clear();
        self.eta.clear();
        self.phi.clear();
        self.gen_pt.clear();
        self.gen_eta.clear();
        self.gen_phi.clear();
        self.gen_pdg_id.clear();
        self.gen_status.clear();
        self.is_signal.clear();
        self.is_pileup.clear();
        self.is_prompt.clear();
        self.from_hard_process.clear();
        self.has_photon_mother.clear();
    }

    fn push(&mut self, index: u32, muon: &Muon, truth: &TruthParticle, has_photon_mother: bool) {
        self.index.push(index);
        self.pt.push(muon.pt);
        self.eta.push(muon.eta);
        self.phi.push(muon.phi);
        self.gen_pt.push(truth.pt);
        self.gen_eta.push(truth.eta);
        self.gen_phi.push(truth.phi);
        self.gen_pdg_id.push(truth.pdg_id);
        self.gen_status.push(truth.status);
        self.is_signal.push(truth.is_signal_muon());
        self.is_pileup.push(truth.is_pileup_like());
        self.is_prompt.push(truth.flags.is_prompt());
        self.from_hard_process.push(truth.flags.from_hard_process());
        self.has_photon_mother.push(has_photon_mother);
    }
}

/// Event-scoped output buffers, handed to the sink by move at flush time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFeatures {
    categories: IndexMap<MuonCategory, CategoryColumns>,
    /// The truth-linked parallel record.
    pub truth_matches: TruthMatchColumns,
    /// Number of muons dropped because an ancestry walk hit its hop bound.
    pub ancestry_faults: u32,
}

impl Default for EventFeatures {
    fn default() -> Self {
        let mut categories = IndexMap::with_capacity(MuonCategory::ALL.len());
        for category in MuonCategory::ALL {
            categories.insert(category, CategoryColumns::default());
        }
        Self {
            categories,
            truth_matches: TruthMatchColumns::default(),
            ancestry_faults: 0,
        }
    }
}

impl EventFeatures {
    /// Fresh, empty buffers with all categories present.
    pub fn new() -> Self {
        Self::default()
    }

    /// The parallel arrays for one category.
    pub fn category(&self, category: MuonCategory) -> &CategoryColumns {
        &self.categories[&category]
    }

    fn category_mut(&mut self, category: MuonCategory) -> &mut CategoryColumns {
        self.categories.entry(category).or_default()
    }

    /// Total number of categorized rows across all categories.
    pub fn n_rows(&self) -> usize {
        self.categories.values().map(CategoryColumns::len).sum()
    }

    /// Whether no rows of either output were appended.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 && self.truth_matches.is_empty()
    }

    /// Reset every buffer to empty. Idempotent.
    pub fn clear(&mut self) {
        for columns in self.categories.values_mut() {
            columns.clear();
        }
        self.truth_matches.clear();
        self.ancestry_faults = 0;
    }
}

/// Computes features for every muon of an event and partitions the output by
/// generator-origin category.
///
/// The per-event cycle is `clear → populate → flush`;
/// [`EventFeatureAggregator::process_event`] runs the full cycle. A failure
/// while populating one muon never corrupts previously flushed events: the
/// buffers are private to the aggregator until handed to the sink by move.
#[derive(Debug, Clone, Default)]
pub struct EventFeatureAggregator {
    buffers: EventFeatures,
    config: ProducerConfig,
}

impl EventFeatureAggregator {
    /// An aggregator with the default framework configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// An aggregator carrying a framework-supplied configuration. The core
    /// computation consumes none of it; it is held for the embedding
    /// framework's collection wiring.
    pub fn with_config(config: ProducerConfig) -> Self {
        Self {
            buffers: EventFeatures::default(),
            config,
        }
    }

    /// The framework configuration this aggregator was built with.
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// The buffers populated so far this event.
    pub fn buffers(&self) -> &EventFeatures {
        &self.buffers
    }

    /// Reset all output buffers to empty. Idempotent; safe to call at the
    /// start of every event.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Compute and buffer features for every muon passing the quality gates.
    ///
    /// Muons that are not tracker muons, have no best-fit track, or have no
    /// (valid) truth match are skipped silently. An ancestry walk hitting its
    /// hop bound drops that muon, is logged, and is counted on the event's
    /// buffers; the event still completes.
    pub fn populate(&mut self, event: &EventData) {
        let vertex = event.primary_vertex();
        for (index, muon) in event.muons.iter().enumerate() {
            if !muon.is_tracker {
                continue;
            }
            let Some(track) = muon.best_track.as_ref() else {
                continue;
            };
            let Some(truth_ref) = muon.truth_match else {
                continue;
            };
            let Some(truth) = event.truth.get(truth_ref) else {
                continue;
            };

            let walks = event
                .truth
                .is_from_photon(truth_ref)
                .and_then(|inclusive| {
                    event
                        .truth
                        .has_photon_mother(truth_ref)
                        .map(|strict| (inclusive, strict))
                });
            let (is_from_photon, has_photon_mother) = match walks {
                Ok(walks) => walks,
                Err(fault) => {
                    tracing::warn!(muon = index, %fault, "dropping muon with malformed ancestry");
                    self.buffers.ancestry_faults += 1;
                    continue;
                }
            };

            let cluster = cluster_tracks(muon, &event.tracks);
            let curve = charge_weighted_curve(&cluster.halo);
            let dz = track.dz(&vertex.position);
            let d0 = track.dxy(&vertex.position);
            let record = MuonFeatureRecord::build(muon, dz, d0, &cluster, &curve);

            let category = if truth.is_pileup_like() {
                MuonCategory::Pileup
            } else if is_from_photon {
                MuonCategory::FromPhoton
            } else {
                MuonCategory::Prompt
            };
            self.buffers.category_mut(category).push(&record);
            self.buffers
                .truth_matches
                .push(index as u32, muon, truth, has_photon_mother);
        }
    }

    /// Hand the populated buffers to the sink by move, leaving the aggregator
    /// cleared for the next event.
    pub fn flush<S: FeatureSink>(&mut self, sink: &mut S) -> MuhaloResult<()> {
        let features = std::mem::take(&mut self.buffers);
        sink.append(features)
    }

    /// Run one event through the full `clear → populate → flush` cycle.
    pub fn process_event<S: FeatureSink>(
        &mut self,
        event: &EventData,
        sink: &mut S,
    ) -> MuhaloResult<()> {
        self.clear();
        self.populate(event);
        self.flush(sink)
    }
}

/// Process a slice of events, each with a private aggregator, appending the
/// results to the sink in input order at a single serialization point.
#[cfg(feature = "rayon")]
pub fn process_events<S: FeatureSink>(events: &[EventData], sink: &mut S) -> MuhaloResult<()> {
    let processed: Vec<EventFeatures> = events
        .par_iter()
        .map(|event| {
            let mut aggregator = EventFeatureAggregator::new();
            aggregator.populate(event);
            std::mem::take(&mut aggregator.buffers)
        })
        .collect();
    for features in processed {
        sink.append(features)?;
    }
    Ok(())
}

/// Process a slice of events, each with a private aggregator, appending the
/// results to the sink in input order at a single serialization point.
#[cfg(not(feature = "rayon"))]
pub fn process_events<S: FeatureSink>(events: &[EventData], sink: &mut S) -> MuhaloResult<()> {
    let mut aggregator = EventFeatureAggregator::new();
    for event in events {
        aggregator.process_event(event, sink)?;
    }
    Ok(())
}
