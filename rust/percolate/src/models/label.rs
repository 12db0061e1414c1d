use serde::{
    Deserialize,
    Serialize,
};

/// Whether an identification comes from the target or the decoy database.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord,
)]
pub enum TargetDecoy {
    Target,
    Decoy,
}

impl TargetDecoy {
    pub fn is_decoy(&self) -> bool {
        match self {
            TargetDecoy::Target => false,
            TargetDecoy::Decoy => true,
        }
    }

    pub fn is_target(&self) -> bool {
        !self.is_decoy()
    }

    /// Parses the tab input convention, `1` for targets and `-1` for decoys.
    pub fn from_pin_label(value: &str) -> Option<Self> {
        match value.trim() {
            "1" | "+1" => Some(TargetDecoy::Target),
            "-1" => Some(TargetDecoy::Decoy),
            _ => None,
        }
    }

    /// Class label as seen by the linear solver.
    pub fn as_svm_label(&self) -> f64 {
        match self {
            TargetDecoy::Target => 1.0,
            TargetDecoy::Decoy => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_labels() {
        assert_eq!(TargetDecoy::from_pin_label("1"), Some(TargetDecoy::Target));
        assert_eq!(TargetDecoy::from_pin_label(" -1"), Some(TargetDecoy::Decoy));
        assert_eq!(TargetDecoy::from_pin_label("0"), None);
        assert_eq!(TargetDecoy::Decoy.as_svm_label(), -1.0);
        assert!(TargetDecoy::Target.is_target());
    }
}
