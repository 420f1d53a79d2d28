//! Single-generation parallel rewrite
//!
//! One derivation runs in three phases over disjoint partitions of the tier:
//!
//! 1. Rule selection and per-partition output sizing (parallel)
//! 2. Output layout: prefix sums over the section sizes hand every partition
//!    a disjoint window of one contiguous output tier (serial)
//! 3. Rewrite into the windows (parallel)
//!
//! Workers never share mutable state; the phases are joined by the fork-join
//! structure itself. Selection randomness comes from per-partition ChaCha
//! sub-streams keyed by `(generation, partition index)`, so a fixed seed
//! reproduces the same tier sequence at any thread count.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use sylva_core::{CancelToken, Environment, Module, Parameters, Rule};

use crate::environment::PrevEnvironment;
use crate::error::DeriveError;
use crate::selector::select_rules;

/// One tier rewrite over a borrowed grammar
pub(crate) struct Derivation<'a> {
    pub parameters: &'a Parameters,
    pub env: Option<&'a dyn Environment>,
    /// Index of the tier being rewritten, keys the RNG sub-streams
    pub generation: u32,
    pub subsection_minimum_size: u32,
    pub max_workers: u32,
}

/// A worker's share of the input: its partition index, its start offset in
/// the tier, and its slice of the shared rules array.
struct Partition<'s, 'r> {
    index: usize,
    start: usize,
    rules: &'s mut [Option<&'r Rule>],
}

impl Derivation<'_> {
    /// Partition count plus the base size and remainder of the split.
    ///
    /// The first `remainder` partitions receive one extra element.
    fn splits(&self, len: usize) -> (usize, usize, usize) {
        let minimum = self.subsection_minimum_size.max(1) as usize;
        let workers = self.max_workers.max(1) as usize;
        let splits = (len / minimum).clamp(1, workers);
        (splits, len / splits, len % splits)
    }

    fn partition_rng(&self, partition: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.parameters.seed);
        rng.set_stream((u64::from(self.generation) << 32) | partition as u64);
        rng
    }

    /// Produce the next tier from `input`.
    ///
    /// The output is either returned whole or not at all; cancellation and
    /// rule failures leave no partially written state behind.
    pub fn run(&self, input: &[Module], token: &CancelToken) -> Result<Vec<Module>, DeriveError> {
        let (splits, base, remainder) = self.splits(input.len());

        // One rule slot per input position, handed to the workers as
        // disjoint partition-shaped slices.
        let mut rules: Vec<Option<&Rule>> = vec![None; input.len()];
        let mut partitions = Vec::with_capacity(splits);
        {
            let mut rest = rules.as_mut_slice();
            let mut cursor = 0;
            for index in 0..splits {
                let size = base + usize::from(index < remainder);
                let (head, tail) = rest.split_at_mut(size);
                partitions.push(Partition {
                    index,
                    start: cursor,
                    rules: head,
                });
                rest = tail;
                cursor += size;
            }
        }

        // Phase 1: rule selection and per-partition output sizing.
        let section_sizes: Vec<usize> = partitions
            .par_iter_mut()
            .map(|partition| {
                let mut rng = self.partition_rng(partition.index);
                select_rules(
                    &self.parameters.rules,
                    input,
                    partition.start,
                    partition.rules,
                    &mut rng,
                );
                partition
                    .rules
                    .iter()
                    .flatten()
                    .map(|rule| rule.output_size())
                    .sum()
            })
            .collect();

        if token.is_cancelled() {
            return Err(DeriveError::Cancelled);
        }

        // Phase 2: allocate the output tier and hand out disjoint windows.
        let total: usize = section_sizes.iter().sum();
        log::debug!(
            "derivation {}: {} modules over {} partitions -> {} modules",
            self.generation,
            input.len(),
            splits,
            total
        );
        let mut output = vec![Module::default(); total];
        let mut jobs = Vec::with_capacity(splits);
        {
            let mut rest = output.as_mut_slice();
            for (partition, &size) in partitions.iter().zip(&section_sizes) {
                let (head, tail) = rest.split_at_mut(size);
                jobs.push((partition, head));
                rest = tail;
            }
        }

        if token.is_cancelled() {
            return Err(DeriveError::Cancelled);
        }

        // Phase 3: rewrite. The first worker error wins.
        jobs.into_par_iter()
            .try_for_each(|(partition, section)| self.rewrite(input, partition, section))?;

        Ok(output)
    }

    /// Walk a partition position by position, rewriting into its window
    fn rewrite(
        &self,
        input: &[Module],
        partition: &Partition<'_, '_>,
        output: &mut [Module],
    ) -> Result<(), DeriveError> {
        let mut cursor = 0;
        for (local, slot) in partition.rules.iter().enumerate() {
            let Some(rule) = slot else { continue };

            let module = &input[partition.start + local];
            let declared = rule.output_size();
            let env = PrevEnvironment::new(self.env, &module.parameters);

            // The window is exactly `declared` modules long; a differing
            // written count is fatal.
            let written = rule.execute(&mut output[cursor..cursor + declared], module, &env)?;
            if written != declared {
                return Err(DeriveError::RuleInconsistent { written, declared });
            }
            cursor += written;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derivation(parameters: &Parameters) -> Derivation<'_> {
        Derivation {
            parameters,
            env: None,
            generation: 0,
            subsection_minimum_size: 64,
            max_workers: 4,
        }
    }

    #[test]
    fn test_empty_tier_derives_to_empty() {
        let parameters = Parameters::default();
        let output = derivation(&parameters)
            .run(&[], &CancelToken::new())
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_partition_sizes_cover_the_tier() {
        let parameters = Parameters::default();
        let derivation = Derivation {
            subsection_minimum_size: 1,
            max_workers: 3,
            ..derivation(&parameters)
        };

        // 8 over 3 partitions: 3 + 3 + 2.
        let (splits, base, remainder) = derivation.splits(8);
        assert_eq!((splits, base, remainder), (3, 2, 2));

        // Below the minimum everything stays in one partition.
        let derivation = Derivation {
            subsection_minimum_size: 64,
            ..derivation
        };
        assert_eq!(derivation.splits(8), (1, 8, 0));
    }

    #[test]
    fn test_cancelled_token_aborts_between_phases() {
        let token = CancelToken::new();
        token.cancel();

        let parameters = Parameters::default();
        let result = derivation(&parameters).run(&[Module::new('A')], &token);
        assert!(matches!(result, Err(DeriveError::Cancelled)));
    }
}
