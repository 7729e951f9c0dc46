use std::collections::BTreeMap;

use log::info;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data::Dataset;
use crate::error::PipelineError;

/// Produces a stratified train/test partition of a labeled dataset.
///
/// Records are grouped by label first, then `test_fraction` of each label
/// stratum is sampled into the test set with a `ChaCha8Rng` seeded from
/// `seed`. A fresh RNG with the same seed is used per stratum, so the
/// assignment inside one stratum never depends on the others and the whole
/// split is reproducible. This preserves the input label proportion in both
/// partitions within rounding, which a naive uniform split does not guarantee
/// under class imbalance.
///
/// Both outputs preserve the input ordering. The input is not mutated.
///
/// # Errors
/// - `Validation` if `test_fraction` is outside (0, 1)
/// - `InsufficientData` if any stratum is too small to give both partitions
///   at least one record
pub fn stratified_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), PipelineError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Validation(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    // BTreeMap keeps stratum iteration order stable across runs.
    let mut strata: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (idx, record) in dataset.iter().enumerate() {
        strata.entry(record.label).or_default().push(idx);
    }

    let mut test_indices: Vec<usize> = Vec::new();
    for (label, indices) in &strata {
        let take = (indices.len() as f64 * test_fraction).round() as usize;
        if take == 0 || take == indices.len() {
            return Err(PipelineError::InsufficientData(format!(
                "stratum for label {} has {} record(s); sampling fraction {} would leave an empty partition",
                label,
                indices.len(),
                test_fraction
            )));
        }

        let mut shuffled = indices.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);
        test_indices.extend_from_slice(&shuffled[..take]);
    }

    test_indices.sort_unstable();

    let mut train = Vec::with_capacity(dataset.len() - test_indices.len());
    let mut test = Vec::with_capacity(test_indices.len());
    let mut next_test = test_indices.iter().peekable();
    for (idx, record) in dataset.iter().enumerate() {
        if next_test.peek() == Some(&&idx) {
            next_test.next();
            test.push(record.clone());
        } else {
            train.push(record.clone());
        }
    }

    info!(
        "Stratified split: {} train / {} test (fraction {}, seed {})",
        train.len(),
        test.len(),
        test_fraction,
        seed
    );

    Ok((train, test))
}
