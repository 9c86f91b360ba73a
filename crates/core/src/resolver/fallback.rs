use rust_decimal::Decimal;

use crate::domain::RateOption;

/// Deterministic stand-in MFN rates for classifications with no sourced MFN
/// row. The candidate is chosen by hashing the importer's display name, so
/// the same importer always receives the same percentage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackRates {
    candidates_pct: Vec<Decimal>,
}

impl Default for FallbackRates {
    fn default() -> Self {
        Self::new(vec![Decimal::new(10, 0), Decimal::new(15, 0), Decimal::new(20, 0)])
    }
}

impl FallbackRates {
    pub fn new(candidates_pct: Vec<Decimal>) -> Self {
        Self { candidates_pct }
    }

    pub fn candidates_pct(&self) -> &[Decimal] {
        &self.candidates_pct
    }

    pub fn pick_pct(&self, importer_name: &str) -> Option<Decimal> {
        if self.candidates_pct.is_empty() {
            return None;
        }

        let digest = blake3::hash(importer_name.as_bytes());
        let mut head = [0_u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        let index = u64::from_le_bytes(head) % self.candidates_pct.len() as u64;

        self.candidates_pct.get(index as usize).copied()
    }

    pub fn synthesize(&self, importer_name: &str) -> Option<RateOption> {
        self.pick_pct(importer_name)
            .map(|pct| RateOption::synthetic_mfn(pct / Decimal::ONE_HUNDRED))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::FallbackRates;
    use crate::domain::{Basis, SYNTHETIC_SOURCE_REF};

    #[test]
    fn same_name_always_yields_same_rate() {
        let fallback = FallbackRates::default();
        let first = fallback.pick_pct("United States");
        for _ in 0..10 {
            assert_eq!(fallback.pick_pct("United States"), first);
        }
    }

    #[test]
    fn picked_rate_is_one_of_the_candidates() {
        let fallback = FallbackRates::default();
        for name in ["United States", "Canada", "Mexico", "Japan", "Germany", ""] {
            let pct = fallback.pick_pct(name).expect("candidates are configured");
            assert!(fallback.candidates_pct().contains(&pct), "{name} picked {pct}");
        }
    }

    #[test]
    fn single_candidate_is_always_chosen() {
        let fallback = FallbackRates::new(vec![Decimal::new(125, 1)]);
        assert_eq!(fallback.pick_pct("anything"), Some(Decimal::new(125, 1)));
    }

    #[test]
    fn empty_candidate_table_synthesizes_nothing() {
        assert!(FallbackRates::new(Vec::new()).synthesize("Canada").is_none());
    }

    #[test]
    fn synthesized_option_is_tagged_and_expressed_as_ratio() {
        let fallback = FallbackRates::new(vec![Decimal::new(15, 0)]);
        let option = fallback.synthesize("Canada").expect("one candidate");

        assert_eq!(option.basis, Basis::Mfn);
        assert_eq!(option.ad_valorem_rate, Some(Decimal::new(15, 2)));
        assert!(option.synthetic);
        assert_eq!(option.id, None);
        assert_eq!(option.source_ref.as_deref(), Some(SYNTHETIC_SOURCE_REF));
    }
}
