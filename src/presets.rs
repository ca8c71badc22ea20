//! Named search spaces for the sequence-model families.
//!
//! Every preset has a `model` group (shared encoder fields plus the
//! architecture's own fields) and an `optimizer` group. Presets are picked
//! by name from configuration:
//!
//! ```
//! use seqtune::SearchSpacePreset;
//!
//! let preset: SearchSpacePreset = "tcn".parse().unwrap();
//! let space = preset.space().unwrap();
//! assert!(space.field("tcn_kernel_size").is_some());
//! assert!(space.field("lr").is_some());
//! ```

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::space::{FieldGroup, SearchSpace};

/// A named search space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchSpacePreset {
    /// Long short-term memory network.
    #[default]
    Lstm,
    /// Temporal convolutional network.
    Tcn,
    /// Multi-head attention, reduced grid (one layer, context 50).
    Mha,
    /// Multi-head attention, full grid.
    MhaFull,
}

impl SearchSpacePreset {
    /// All presets.
    pub const ALL: [SearchSpacePreset; 4] = [
        SearchSpacePreset::Lstm,
        SearchSpacePreset::Tcn,
        SearchSpacePreset::Mha,
        SearchSpacePreset::MhaFull,
    ];

    /// The configuration name of the preset.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SearchSpacePreset::Lstm => "lstm",
            SearchSpacePreset::Tcn => "tcn",
            SearchSpacePreset::Mha => "mha",
            SearchSpacePreset::MhaFull => "mha-full",
        }
    }

    /// Builds the search space.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in presets; the `Result` comes from
    /// [`SearchSpace::new`].
    pub fn space(self) -> Result<SearchSpace> {
        let model = match self {
            SearchSpacePreset::Lstm => encoder().categorical("lstm_layers", [1_i64, 2]),
            SearchSpacePreset::Tcn => encoder()
                .categorical("tcn_kernel_size", [8_i64, 16])
                .categorical("tcn_layers", [2_i64, 3, 4])
                .categorical("tcn_dropout", [0.0, 0.2]),
            SearchSpacePreset::Mha => encoder()
                .categorical("mha_heads", [2_i64, 4])
                .categorical("mha_layers", [1_i64])
                .categorical("mha_max_context", [50_i64])
                .categorical("mha_dropout", [0.0, 0.1]),
            SearchSpacePreset::MhaFull => encoder()
                .categorical("mha_heads", [2_i64, 4])
                .categorical("mha_layers", [1_i64, 2, 3])
                .categorical("mha_max_context", [50_i64, 150, 250])
                .categorical("mha_dropout", [0.0, 0.1, 0.2]),
        };
        SearchSpace::new(vec![model, optimizer()])
    }
}

fn encoder() -> FieldGroup {
    FieldGroup::new("model")
        .categorical("model_dim", [64_i64, 128, 256])
        .categorical("enc_dropout", [0.0, 0.2])
        .categorical(
            "fusion_method",
            ["pre_encoded", "pre_repeated", "post_repeated"],
        )
}

fn optimizer() -> FieldGroup {
    FieldGroup::new("optimizer")
        .categorical("lr", [1e-4, 1e-3, 1e-2])
        .categorical("weight_decay", [1e-1, 1e-2, 1e-3])
}

impl fmt::Display for SearchSpacePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchSpacePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown search space preset '{s}' (expected lstm, tcn, mha or mha-full)"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Configuration;

    #[test]
    fn every_preset_builds() {
        for preset in SearchSpacePreset::ALL {
            let space = preset.space().unwrap();
            assert_eq!(space.groups().len(), 2);
            assert_eq!(preset.as_str().parse::<SearchSpacePreset>().unwrap(), preset);
        }
        assert_eq!(SearchSpacePreset::Lstm.space().unwrap().len(), 6);
        assert_eq!(SearchSpacePreset::MhaFull.space().unwrap().len(), 9);
        assert!("gru".parse::<SearchSpacePreset>().is_err());
    }

    #[test]
    fn reduced_and_full_attention_grids_differ() {
        let mha = SearchSpacePreset::Mha.space().unwrap();
        let full = SearchSpacePreset::MhaFull.space().unwrap();
        assert_ne!(mha.signature().unwrap(), full.signature().unwrap());
        assert_eq!(mha.field("mha_layers").unwrap().domain.len(), 1);
        assert_eq!(full.field("mha_layers").unwrap().domain.len(), 3);
    }

    #[test]
    fn groups_split_back_into_nested_configs() {
        let space = SearchSpacePreset::Lstm.space().unwrap();
        let config = Configuration::new()
            .with("model_dim", 64_i64)
            .with("enc_dropout", 0.0)
            .with("fusion_method", "pre_encoded")
            .with("lstm_layers", 2_i64)
            .with("lr", 1e-3)
            .with("weight_decay", 1e-2);
        assert!(space.admits(&config));
        let optimizer = space.group_values(&config, "optimizer").unwrap();
        assert_eq!(optimizer.len(), 2);
        assert_eq!(optimizer.get_float("lr").unwrap(), 1e-3);
    }
}
