//! Scripted interaction scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// WS-001: click one node, watch the full warp
    SingleWarp,

    /// WS-002: three warps back to back
    ChainedWarps,

    /// WS-003: clicks during a warp are ignored
    ClickDuringWarp,

    /// WS-004: programmatic re-anchor mid-warp re-bases without a jump
    ProgrammaticRewarp,

    /// WS-005: surface resized while warping
    ResizeMidWarp,

    /// WS-006: hover highlighting, idle and mid-warp
    HoverSweep,

    /// WS-007: local UMAP embedding around a query node
    EmbeddingProbe,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleWarp,
            ScenarioId::ChainedWarps,
            ScenarioId::ClickDuringWarp,
            ScenarioId::ProgrammaticRewarp,
            ScenarioId::ResizeMidWarp,
            ScenarioId::HoverSweep,
            ScenarioId::EmbeddingProbe,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleWarp => "single_warp",
            ScenarioId::ChainedWarps => "chained_warps",
            ScenarioId::ClickDuringWarp => "click_during_warp",
            ScenarioId::ProgrammaticRewarp => "programmatic_rewarp",
            ScenarioId::ResizeMidWarp => "resize_mid_warp",
            ScenarioId::HoverSweep => "hover_sweep",
            ScenarioId::EmbeddingProbe => "embedding_probe",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleWarp => "Click a visible node and let the three phases play out",
            ScenarioId::ChainedWarps => "Three click-warps in a row, one anchor at a time",
            ScenarioId::ClickDuringWarp => "A click mid-warp must not change the anchor",
            ScenarioId::ProgrammaticRewarp => "Re-anchor from code mid-warp, nodes continue in place",
            ScenarioId::ResizeMidWarp => "Resize during release, picking follows the new aspect",
            ScenarioId::HoverSweep => "Pointer sweeps over nodes, highlight and cursor follow",
            ScenarioId::EmbeddingProbe => "UMAP of a node's 30 nearest neighbors in 16D",
        }
    }

    /// Returns true if the scenario drives the warp engine.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, ScenarioId::EmbeddingProbe)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_warp" | "singlewarp" | "ws-001" => Ok(ScenarioId::SingleWarp),
            "chained_warps" | "chainedwarps" | "ws-002" => Ok(ScenarioId::ChainedWarps),
            "click_during_warp" | "clickduringwarp" | "ws-003" => Ok(ScenarioId::ClickDuringWarp),
            "programmatic_rewarp" | "programmaticrewarp" | "ws-004" => {
                Ok(ScenarioId::ProgrammaticRewarp)
            }
            "resize_mid_warp" | "resizemidwarp" | "ws-005" => Ok(ScenarioId::ResizeMidWarp),
            "hover_sweep" | "hoversweep" | "ws-006" => Ok(ScenarioId::HoverSweep),
            "embedding_probe" | "embeddingprobe" | "ws-007" => Ok(ScenarioId::EmbeddingProbe),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("WS-003".parse::<ScenarioId>(), Ok(ScenarioId::ClickDuringWarp));
        assert_eq!("HoverSweep".parse::<ScenarioId>(), Ok(ScenarioId::HoverSweep));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }
}
