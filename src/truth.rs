use serde::{Deserialize, Serialize};

use crate::{utils::vectors::Vec3, Float, MuhaloError, MuhaloResult};

/// Upper bound on mother-chain hops before a walk is abandoned.
///
/// Truth chains are finite and acyclic by construction of the input, so this
/// bound is only ever reached on malformed data. A reached bound surfaces as
/// [`MuhaloError::AncestryDepthExceeded`] rather than silent truncation.
pub const MAX_ANCESTRY_HOPS: usize = 10_000;

/// PDG identifier of the photon.
pub const PHOTON_PDG_ID: i32 = 22;
/// PDG identifier of the muon.
pub const MUON_PDG_ID: i32 = 13;
/// Generator status code of a final-state particle.
pub const FINAL_STATE_STATUS: i32 = 1;
/// Longitudinal production bound (input distance units) beyond which a truth
/// particle reads as pileup regardless of its status flags.
pub const PILEUP_VZ_BOUND: Float = 1.0;

/// Packed generator-status flags carried by a truth particle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags(u16);

impl StatusFlags {
    /// The particle is prompt (not produced in a hadron or tau decay).
    pub const PROMPT: u16 = 1 << 0;
    /// The particle is part of the hard process itself.
    pub const HARD_PROCESS: u16 = 1 << 1;
    /// The particle descends from the hard process.
    pub const FROM_HARD_PROCESS: u16 = 1 << 2;
    /// The particle is the last copy before decay.
    pub const LAST_COPY: u16 = 1 << 3;

    /// Flags from a raw bit pattern.
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }
    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }
    /// The raw bit pattern.
    pub const fn bits(&self) -> u16 {
        self.0
    }
    /// True when every bit of `mask` is set.
    pub const fn contains(&self, mask: u16) -> bool {
        self.0 & mask == mask
    }
    /// A copy with the bits of `mask` also set.
    pub const fn with(self, mask: u16) -> Self {
        Self(self.0 | mask)
    }
    /// Whether [`StatusFlags::PROMPT`] is set.
    pub const fn is_prompt(&self) -> bool {
        self.contains(Self::PROMPT)
    }
    /// Whether [`StatusFlags::HARD_PROCESS`] is set.
    pub const fn is_hard_process(&self) -> bool {
        self.contains(Self::HARD_PROCESS)
    }
    /// Whether [`StatusFlags::FROM_HARD_PROCESS`] is set.
    pub const fn from_hard_process(&self) -> bool {
        self.contains(Self::FROM_HARD_PROCESS)
    }
    /// Whether [`StatusFlags::LAST_COPY`] is set.
    pub const fn is_last_copy(&self) -> bool {
        self.contains(Self::LAST_COPY)
    }
}

/// Stable index of a truth particle within its owning [`TruthCollection`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TruthRef(pub usize);

/// A generator-level particle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthParticle {
    /// PDG particle-type identifier.
    pub pdg_id: i32,
    /// Generator status code.
    pub status: i32,
    /// Transverse momentum.
    pub pt: Float,
    /// Pseudorapidity.
    pub eta: Float,
    /// Azimuthal angle.
    pub phi: Float,
    /// Production vertex (displacement from the origin).
    pub vertex: Vec3,
    /// Packed generator-status flags.
    pub flags: StatusFlags,
    /// Mother within the owning collection; `None` terminates the chain.
    pub mother: Option<TruthRef>,
}

impl TruthParticle {
    /// Whether this particle reads as pileup: neither flagged prompt nor
    /// flagged as descending from the hard process, or produced with a
    /// longitudinal displacement beyond [`PILEUP_VZ_BOUND`]. The two signals
    /// are independent; either alone suffices.
    pub fn is_pileup_like(&self) -> bool {
        !(self.flags.is_prompt() || self.flags.from_hard_process())
            || self.vertex.z().abs() > PILEUP_VZ_BOUND
    }

    /// Whether this particle is a signal muon: prompt, descending from the
    /// hard process, a muon by PDG identifier, and final-state.
    pub fn is_signal_muon(&self) -> bool {
        self.flags.is_prompt()
            && self.flags.from_hard_process()
            && self.pdg_id.abs() == MUON_PDG_ID
            && self.status == FINAL_STATE_STATUS
    }
}

/// The photon-descent and pileup classification of one truth particle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthLabel {
    /// Any particle in the chain, the particle itself included, is a photon.
    pub is_from_photon: bool,
    /// The particle reads as pileup by flags or by displacement.
    pub is_pileup_like: bool,
}

/// An arena of truth particles addressed by stable integer index, with the
/// mother relation stored as an optional index into the same arena.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruthCollection {
    particles: Vec<TruthParticle>,
}

impl TruthCollection {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a particle, returning its [`TruthRef`]. Mothers must be pushed
    /// before the particles that reference them (or patched afterwards).
    pub fn push(&mut self, particle: TruthParticle) -> TruthRef {
        self.particles.push(particle);
        TruthRef(self.particles.len() - 1)
    }

    /// Look up a particle; a dangling reference yields `None`.
    pub fn get(&self, reference: TruthRef) -> Option<&TruthParticle> {
        self.particles.get(reference.0)
    }

    /// Number of particles in the arena.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the arena holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Walk the mother chain starting at the particle itself and report
    /// whether any particle along it is a photon (`|pdg| == 22`).
    ///
    /// This is the inclusive-of-self variant used by the category split; the
    /// strict-ancestors variant is [`TruthCollection::has_photon_mother`].
    pub fn is_from_photon(&self, start: TruthRef) -> MuhaloResult<bool> {
        self.photon_in_chain(Some(start), start)
    }

    /// Walk strictly through mothers, excluding the particle itself, and
    /// report whether any ancestor is a photon.
    ///
    /// Kept distinct from [`TruthCollection::is_from_photon`]; the truth-linked
    /// output depends on this stricter semantics.
    pub fn has_photon_mother(&self, start: TruthRef) -> MuhaloResult<bool> {
        let first_mother = self.get(start).and_then(|p| p.mother);
        self.photon_in_chain(first_mother, start)
    }

    /// Both classification booleans for one particle, or `None` when the
    /// reference dangles.
    pub fn classify(&self, start: TruthRef) -> MuhaloResult<Option<TruthLabel>> {
        let Some(particle) = self.get(start) else {
            return Ok(None);
        };
        Ok(Some(TruthLabel {
            is_from_photon: self.is_from_photon(start)?,
            is_pileup_like: particle.is_pileup_like(),
        }))
    }

    fn photon_in_chain(&self, mut cursor: Option<TruthRef>, start: TruthRef) -> MuhaloResult<bool> {
        let mut hops = 0usize;
        while let Some(reference) = cursor {
            if hops >= MAX_ANCESTRY_HOPS {
                return Err(MuhaloError::AncestryDepthExceeded {
                    start: start.0,
                    max_hops: MAX_ANCESTRY_HOPS,
                });
            }
            // A dangling mother link terminates the chain like a missing mother.
            let Some(particle) = self.get(reference) else {
                break;
            };
            if particle.pdg_id.abs() == PHOTON_PDG_ID {
                return Ok(true);
            }
            cursor = particle.mother;
            hops += 1;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(pdg_id: i32, mother: Option<TruthRef>) -> TruthParticle {
        TruthParticle {
            pdg_id,
            status: 1,
            pt: 20.0,
            eta: 0.1,
            phi: 0.2,
            vertex: Vec3::default(),
            flags: StatusFlags::empty(),
            mother,
        }
    }

    /// muon(13) -> W(24) -> photon(22) -> (none)
    fn photon_chain() -> (TruthCollection, TruthRef) {
        let mut truth = TruthCollection::new();
        let photon = truth.push(particle(22, None));
        let w = truth.push(particle(24, Some(photon)));
        let muon = truth.push(particle(13, Some(w)));
        (truth, muon)
    }

    #[test]
    fn photon_descent_inclusive() {
        let (truth, muon) = photon_chain();
        assert!(truth.is_from_photon(muon).unwrap());
        // a bare photon is its own photon ancestor in the inclusive variant
        let mut bare = TruthCollection::new();
        let photon = bare.push(particle(-22, None));
        assert!(bare.is_from_photon(photon).unwrap());
        assert!(!bare.has_photon_mother(photon).unwrap());
    }

    #[test]
    fn photon_descent_strict() {
        let (truth, muon) = photon_chain();
        assert!(truth.has_photon_mother(muon).unwrap());
        let mut no_photon = TruthCollection::new();
        let w = no_photon.push(particle(24, None));
        let muon = no_photon.push(particle(13, Some(w)));
        assert!(!no_photon.has_photon_mother(muon).unwrap());
        assert!(!no_photon.is_from_photon(muon).unwrap());
    }

    #[test]
    fn walk_terminates_within_chain_length() {
        let mut truth = TruthCollection::new();
        let mut mother = None;
        for _ in 0..100 {
            mother = Some(truth.push(particle(2212, mother)));
        }
        let leaf = mother.unwrap();
        assert!(!truth.is_from_photon(leaf).unwrap());
    }

    #[test]
    fn cyclic_chain_faults_instead_of_looping() {
        let mut truth = TruthCollection::new();
        let a = truth.push(particle(13, Some(TruthRef(1))));
        truth.push(particle(24, Some(a)));
        let err = truth.is_from_photon(a).unwrap_err();
        assert!(matches!(
            err,
            MuhaloError::AncestryDepthExceeded { start: 0, .. }
        ));
    }

    #[test]
    fn dangling_mother_terminates_chain() {
        let mut truth = TruthCollection::new();
        let muon = truth.push(particle(13, Some(TruthRef(99))));
        assert!(!truth.is_from_photon(muon).unwrap());
        assert!(!truth.has_photon_mother(muon).unwrap());
        assert!(truth.get(TruthRef(99)).is_none());
    }

    #[test]
    fn pileup_by_flags_alone() {
        // not prompt, not from the hard process, vz well inside the bound
        let mut p = particle(13, None);
        p.vertex = Vec3::new(0.0, 0.0, 0.5);
        assert!(p.is_pileup_like());
    }

    #[test]
    fn pileup_by_displacement_alone() {
        let mut p = particle(13, None);
        p.flags = StatusFlags::empty().with(StatusFlags::PROMPT | StatusFlags::FROM_HARD_PROCESS);
        p.vertex = Vec3::new(0.0, 0.0, -1.5);
        assert!(p.is_pileup_like());
        p.vertex = Vec3::new(0.0, 0.0, 0.5);
        assert!(!p.is_pileup_like());
    }

    #[test]
    fn signal_requires_all_four_conditions() {
        let flags = StatusFlags::empty().with(StatusFlags::PROMPT | StatusFlags::FROM_HARD_PROCESS);
        let mut p = particle(-13, None);
        p.flags = flags;
        assert!(p.is_signal_muon());
        p.status = 2;
        assert!(!p.is_signal_muon());
        p.status = 1;
        p.pdg_id = 11;
        assert!(!p.is_signal_muon());
        p.pdg_id = 13;
        p.flags = StatusFlags::empty().with(StatusFlags::PROMPT);
        assert!(!p.is_signal_muon());
    }

    #[test]
    fn classify_bundles_both_booleans() {
        let (truth, muon) = photon_chain();
        let label = truth.classify(muon).unwrap().unwrap();
        assert!(label.is_from_photon);
        assert!(label.is_pileup_like); // no flags set in the test chain
        assert!(truth.classify(TruthRef(99)).unwrap().is_none());
    }

    #[test]
    fn status_flag_bits() {
        let flags = StatusFlags::new(StatusFlags::PROMPT | StatusFlags::LAST_COPY);
        assert!(flags.is_prompt());
        assert!(flags.is_last_copy());
        assert!(!flags.is_hard_process());
        assert!(!flags.from_hard_process());
        assert_eq!(flags.bits(), 0b1001);
    }
}
