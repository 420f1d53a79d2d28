//! Per-module rule selection
//!
//! For each position: collect matching rules, keep only the highest
//! priority, and resolve any remaining tie with one weighted random draw.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sylva_core::{Module, Rule};

/// Fill `selected` with at most one rule per position of a partition.
///
/// `offset` is the partition's start within `tier`. Context is always drawn
/// from the full tier, so partition boundaries never truncate it.
pub(crate) fn select_rules<'r>(
    rules: &'r [Rule],
    tier: &[Module],
    offset: usize,
    selected: &mut [Option<&'r Rule>],
    rng: &mut ChaCha8Rng,
) {
    // Reused across positions.
    let mut matching: Vec<&Rule> = Vec::with_capacity(rules.len());

    for (local, slot) in selected.iter_mut().enumerate() {
        let index = offset + local;
        let module = &tier[index];
        let left = &tier[..index];
        let right = &tier[index + 1..];

        matching.clear();
        matching.extend(rules.iter().filter(|r| r.matches(module, left, right)));

        // Keep only the rules sharing the highest priority.
        if matching.len() > 1 {
            let max_priority = matching.iter().map(|r| r.priority()).max().unwrap_or(0);
            matching.retain(|r| r.priority() == max_priority);
        }

        *slot = match matching.len() {
            0 => None,
            1 => Some(matching[0]),
            _ => pick_stochastic(&mut matching, rng),
        };
    }
}

/// Weighted pick among equal-priority survivors.
///
/// Probabilities are normalised by their sum, so user-supplied weights may
/// add up to anything above zero; a zero mass selects nothing. The ascending
/// stable sort makes equal-probability ties deterministic by insertion
/// order.
fn pick_stochastic<'r>(matching: &mut [&'r Rule], rng: &mut ChaCha8Rng) -> Option<&'r Rule> {
    let total: f64 = matching.iter().map(|r| r.probability()).sum();
    if total == 0.0 {
        return None;
    }
    let scale = 1.0 / total;

    matching.sort_by(|a, b| a.probability().total_cmp(&b.probability()));

    let draw = rng.random::<f64>();
    let mut cumulative = 0.0;
    for rule in matching.iter() {
        cumulative += scale * rule.probability();
        if draw < cumulative {
            return Some(rule);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use sylva_core::GeneralRule;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn select_one(rules: &[Rule], tier: &[Module], index: usize) -> Option<usize> {
        let mut selected = vec![None; tier.len()];
        select_rules(rules, tier, 0, &mut selected, &mut rng());
        selected[index].map(|rule| {
            rules
                .iter()
                .position(|candidate| std::ptr::eq(candidate, rule))
                .unwrap()
        })
    }

    #[test]
    fn test_no_match_selects_nothing() {
        let rules = vec![Rule::General(GeneralRule::classic('V', Vec::new()))];
        let tier = vec![Module::new('A')];
        assert_eq!(select_one(&rules, &tier, 0), None);
    }

    #[test]
    fn test_single_match_is_selected() {
        let rules = vec![Rule::General(GeneralRule::classic('V', Vec::new()))];
        let tier = vec![Module::new('V')];
        assert_eq!(select_one(&rules, &tier, 0), Some(0));
    }

    #[test]
    fn test_priority_filter_beats_probability() {
        // A context-sensitive rule (priority 1) wins over a context-free one
        // even when both match.
        let rules = vec![
            Rule::General(GeneralRule::classic('V', Vec::new())),
            Rule::General(GeneralRule::context_sensitive(
                'V',
                Vec::new(),
                vec!['A'],
                Vec::new(),
            )),
        ];
        let tier = vec![Module::new('A'), Module::new('V')];
        assert_eq!(select_one(&rules, &tier, 1), Some(1));
    }

    #[test]
    fn test_zero_probability_mass_selects_nothing() {
        let rules = vec![
            Rule::General(GeneralRule::stochastic('V', Vec::new(), 0.0)),
            Rule::General(GeneralRule::stochastic('V', Vec::new(), 0.0)),
        ];
        let tier = vec![Module::new('V')];
        assert_eq!(select_one(&rules, &tier, 0), None);
    }

    #[test]
    fn test_certain_rule_always_wins_over_impossible_one() {
        let rules = vec![
            Rule::General(GeneralRule::stochastic('V', Vec::new(), 0.0)),
            Rule::General(GeneralRule::stochastic('V', Vec::new(), 1.0)),
        ];
        let tier = vec![Module::new('V'); 64];
        let mut selected = vec![None; tier.len()];
        select_rules(&rules, &tier, 0, &mut selected, &mut rng());

        for slot in selected {
            let rule = slot.expect("a rule must be selected");
            assert!((rule.probability() - 1.0).abs() < 1e-12);
        }
    }
}
