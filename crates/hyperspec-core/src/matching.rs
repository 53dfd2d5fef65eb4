use rayon::prelude::*;
use tracing::debug;

use crate::config::{MatcherConfig, NormType};
use crate::consts::PARALLEL_MATCH_THRESHOLD;
use crate::features::Descriptor;

/// A correspondence between a query descriptor and a train descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: u32,
}

/// Number of differing bits.
#[inline]
pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(&x, &y)| (x ^ y).count_ones()).sum()
}

/// Number of differing 2-bit fields.
#[inline]
pub fn hamming2(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x ^ y;
            ((d | (d >> 1)) & 0x55).count_ones()
        })
        .sum()
}

pub fn distance(norm: NormType, a: &Descriptor, b: &Descriptor) -> u32 {
    match norm {
        NormType::Hamming => hamming(a, b),
        NormType::Hamming2 => hamming2(a, b),
    }
}

/// Index and distance of the nearest descriptor in `set`. Ties resolve to the
/// lowest index.
fn nearest(norm: NormType, d: &Descriptor, set: &[Descriptor]) -> Option<(usize, u32)> {
    set.iter()
        .enumerate()
        .map(|(j, other)| (j, distance(norm, d, other)))
        .min_by_key(|&(j, dist)| (dist, j))
}

fn nearest_all(
    norm: NormType,
    from: &[Descriptor],
    to: &[Descriptor],
) -> Vec<Option<(usize, u32)>> {
    if from.len() >= PARALLEL_MATCH_THRESHOLD {
        from.par_iter().map(|d| nearest(norm, d, to)).collect()
    } else {
        from.iter().map(|d| nearest(norm, d, to)).collect()
    }
}

/// Brute-force nearest-neighbour matching of `query` against `train`.
///
/// With `cross_check`, (i, j) is kept only when i is also the nearest query
/// descriptor to j. Matches are ordered by query index.
pub fn match_descriptors(
    query: &[Descriptor],
    train: &[Descriptor],
    config: &MatcherConfig,
) -> Vec<DMatch> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let forward = nearest_all(config.norm, query, train);
    let backward = config
        .cross_check
        .then(|| nearest_all(config.norm, train, query));

    let matches: Vec<DMatch> = forward
        .into_iter()
        .enumerate()
        .filter_map(|(query_idx, best)| {
            let (train_idx, distance) = best?;
            if let Some(backward) = &backward {
                let (back_idx, _) = backward[train_idx]?;
                if back_idx != query_idx {
                    return None;
                }
            }
            Some(DMatch {
                query_idx,
                train_idx,
                distance,
            })
        })
        .collect();

    debug!(
        query = query.len(),
        train = train.len(),
        matches = matches.len(),
        norm = %config.norm,
        "Brute-force matching"
    );
    matches
}
