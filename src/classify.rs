// src/classify.rs
// Maps raw punch-state codes to IN/OUT. Pure; the orchestrator calls this
// once per punch before building the check-in request.

use crate::config::{DeviceConfig, DirectionMode};
use crate::types::Direction;

/// Effective IN/OUT code sets for one device: the device override when
/// present, else the global configuration, else the stock BioTime values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunchCodeSets {
    pub in_codes: Vec<u32>,
    pub out_codes: Vec<u32>,
}

impl Default for PunchCodeSets {
    fn default() -> Self {
        Self {
            in_codes: vec![0, 4],
            out_codes: vec![1, 5],
        }
    }
}

impl PunchCodeSets {
    pub fn new(in_codes: Vec<u32>, out_codes: Vec<u32>) -> Self {
        Self {
            in_codes,
            out_codes,
        }
    }

    /// Resolve the sets for one device, preferring its overrides.
    pub fn for_device(global: &PunchCodeSets, device: &DeviceConfig) -> Self {
        Self {
            in_codes: device
                .punch_values_in
                .clone()
                .unwrap_or_else(|| global.in_codes.clone()),
            out_codes: device
                .punch_values_out
                .clone()
                .unwrap_or_else(|| global.out_codes.clone()),
        }
    }
}

/// Classify one raw punch code.
///
/// A fixed `IN`/`OUT` device mode always wins, regardless of the code.
/// `AUTO` looks the code up in the OUT set first, then the IN set; a code
/// in neither yields `None` and the push proceeds with an absent
/// direction (the HR endpoint applies its own default). An unset mode
/// never classifies.
pub fn classify(
    raw_code: u32,
    mode: Option<DirectionMode>,
    sets: &PunchCodeSets,
) -> Option<Direction> {
    match mode {
        Some(DirectionMode::In) => Some(Direction::In),
        Some(DirectionMode::Out) => Some(Direction::Out),
        Some(DirectionMode::Auto) => {
            if sets.out_codes.contains(&raw_code) {
                Some(Direction::Out)
            } else if sets.in_codes.contains(&raw_code) {
                Some(Direction::In)
            } else {
                None
            }
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_mode_wins_over_raw_code() {
        let sets = PunchCodeSets::default();
        for code in [0, 1, 4, 5, 255] {
            assert_eq!(
                classify(code, Some(DirectionMode::Out), &sets),
                Some(Direction::Out)
            );
            assert_eq!(
                classify(code, Some(DirectionMode::In), &sets),
                Some(Direction::In)
            );
        }
    }

    #[test]
    fn auto_checks_out_set_first() {
        // A code present in both sets must resolve OUT.
        let sets = PunchCodeSets::new(vec![0, 4, 7], vec![1, 5, 7]);
        assert_eq!(
            classify(7, Some(DirectionMode::Auto), &sets),
            Some(Direction::Out)
        );
    }

    #[test]
    fn auto_resolves_defaults() {
        let sets = PunchCodeSets::default();
        assert_eq!(
            classify(0, Some(DirectionMode::Auto), &sets),
            Some(Direction::In)
        );
        assert_eq!(
            classify(4, Some(DirectionMode::Auto), &sets),
            Some(Direction::In)
        );
        assert_eq!(
            classify(1, Some(DirectionMode::Auto), &sets),
            Some(Direction::Out)
        );
        assert_eq!(
            classify(5, Some(DirectionMode::Auto), &sets),
            Some(Direction::Out)
        );
    }

    #[test]
    fn auto_unknown_code_is_unclassified() {
        let sets = PunchCodeSets::default();
        assert_eq!(classify(255, Some(DirectionMode::Auto), &sets), None);
    }

    #[test]
    fn unset_mode_never_classifies() {
        let sets = PunchCodeSets::default();
        assert_eq!(classify(0, None, &sets), None);
        assert_eq!(classify(1, None, &sets), None);
    }
}
