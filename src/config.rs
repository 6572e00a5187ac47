use serde::{Deserialize, Serialize};

use crate::Float;

/// The framework-facing configuration surface: named input-collection
/// identifiers, the center-of-mass energy, and an optional mass window.
///
/// The embedding framework owns collection retrieval and uses these
/// identifiers for its token wiring; the core feature computation consumes
/// none of them. The mass window in particular is accepted but unused by the
/// current logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Input collection of reconstructed muons.
    pub muons: String,
    /// Input collection of candidate tracks.
    pub candidate_tracks: String,
    /// Input collection of reconstructed vertices.
    pub vertices: String,
    /// Input collection of pileup summary information.
    pub pileup_info: String,
    /// Pruned generator-truth collection.
    pub pruned_truth: String,
    /// Packed generator-truth collection.
    pub packed_truth: String,
    /// Center-of-mass energy in GeV.
    pub sqrt_s: Float,
    /// Optional invariant-mass window bounds.
    pub mass_window: Option<(Float, Float)>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            muons: "slimmedMuons".to_string(),
            candidate_tracks: "isolatedTracks".to_string(),
            vertices: "offlineSlimmedPrimaryVertices".to_string(),
            pileup_info: "slimmedAddPileupInfo".to_string(),
            pruned_truth: "prunedGenParticles".to_string(),
            packed_truth: "packedGenParticles".to_string(),
            sqrt_s: 13000.0,
            mass_window: None,
        }
    }
}

impl ProducerConfig {
    /// Set the center-of-mass energy.
    pub fn with_sqrt_s(mut self, sqrt_s: Float) -> Self {
        self.sqrt_s = sqrt_s;
        self
    }

    /// Set the invariant-mass window bounds.
    pub fn with_mass_window(mut self, low: Float, high: Float) -> Self {
        self.mass_window = Some((low, high));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_collections() {
        let config = ProducerConfig::default();
        assert_eq!(config.muons, "slimmedMuons");
        assert_eq!(config.vertices, "offlineSlimmedPrimaryVertices");
        assert_eq!(config.sqrt_s, 13000.0);
        assert!(config.mass_window.is_none());
    }

    #[test]
    fn builder_methods() {
        let config = ProducerConfig::default()
            .with_sqrt_s(13600.0)
            .with_mass_window(70.0, 110.0);
        assert_eq!(config.sqrt_s, 13600.0);
        assert_eq!(config.mass_window, Some((70.0, 110.0)));
    }
}
