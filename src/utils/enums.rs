use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::MuhaloError;

/// Generator-level origin categories for reconstructed muons.
///
/// Exactly one category applies to each truth-matched muon, and the
/// [`Display`] form of each variant is the column prefix used by the
/// category-partitioned output (`prompt_pt`, `pileup_pt`, `fromPhoton_pt`,
/// and so on).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MuonCategory {
    /// A prompt muon from the hard interaction.
    Prompt,
    /// A muon whose truth record reads as pileup, either by status flags or by
    /// longitudinal production displacement.
    Pileup,
    /// A muon with a photon somewhere in its ancestry chain.
    FromPhoton,
}

impl MuonCategory {
    /// All categories, in output-column order.
    pub const ALL: [MuonCategory; 3] = [Self::Prompt, Self::Pileup, Self::FromPhoton];
}

impl Display for MuonCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MuonCategory::Prompt => write!(f, "prompt"),
            MuonCategory::Pileup => write!(f, "pileup"),
            MuonCategory::FromPhoton => write!(f, "fromPhoton"),
        }
    }
}

impl FromStr for MuonCategory {
    type Err = MuhaloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt),
            "pileup" => Ok(Self::Pileup),
            "fromphoton" | "from-photon" | "from_photon" | "photon" => Ok(Self::FromPhoton),
            _ => Err(MuhaloError::ParseError {
                name: s.to_string(),
                object: "MuonCategory".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_displays() {
        assert_eq!(format!("{}", MuonCategory::Prompt), "prompt");
        assert_eq!(format!("{}", MuonCategory::Pileup), "pileup");
        assert_eq!(format!("{}", MuonCategory::FromPhoton), "fromPhoton");
    }

    #[test]
    fn category_from_str() {
        assert_eq!(
            MuonCategory::from_str("prompt").unwrap(),
            MuonCategory::Prompt
        );
        assert_eq!(
            MuonCategory::from_str("Pileup").unwrap(),
            MuonCategory::Pileup
        );
        assert_eq!(
            MuonCategory::from_str("fromPhoton").unwrap(),
            MuonCategory::FromPhoton
        );
        assert_eq!(
            MuonCategory::from_str("from-photon").unwrap(),
            MuonCategory::FromPhoton
        );
        assert!(MuonCategory::from_str("signal").is_err());
    }
}
