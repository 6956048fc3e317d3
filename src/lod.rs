//! Level-of-detail row assignment
//!
//! LOD 0 is full fidelity. Each coarser LOD activates a subset of the output
//! rows active at the LOD before it. A row's rank is the coarsest LOD at which
//! it is still active; evaluating at `lod` computes every row whose rank is
//! `>= lod`.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use core::ops::Range;

use crate::error::ConfigError;

/// LOD index. `0` is full fidelity.
pub type Lod = u16;

/// Most LODs a storage can declare
pub const MAX_LODS: usize = 32;

/// Nested per-LOD active output-row ranges
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LodSpec {
    /// `ranges[lod]`: half-open row ranges active at `lod`
    ranges: Vec<Vec<Range<u32>>>,
}

impl LodSpec {
    /// Create from explicit row ranges per LOD
    ///
    /// Ranges within one LOD may overlap or come in any order. Validation
    /// against an output count happens in [`LodSpec::resolve`].
    pub fn new(ranges: Vec<Vec<Range<u32>>>) -> Self {
        Self { ranges }
    }

    /// LOD `l` activates rows `[0, counts[l])`
    ///
    /// Counts must be non-increasing for the result to resolve.
    pub fn from_row_counts(counts: &[u32]) -> Self {
        Self {
            ranges: counts.iter().map(|&count| vec![0..count]).collect(),
        }
    }

    /// Every row active at every one of `lod_count` LODs
    pub fn uniform(output_count: u32, lod_count: usize) -> Self {
        Self {
            ranges: vec![vec![0..output_count]; lod_count],
        }
    }

    /// Number of declared LODs
    #[inline]
    pub fn lod_count(&self) -> usize {
        self.ranges.len()
    }

    /// Ranges declared for `lod`
    pub fn ranges(&self, lod: Lod) -> &[Range<u32>] {
        self.ranges.get(lod as usize).map_or(&[], Vec::as_slice)
    }

    /// Validate against `output_count` and compute each row's rank
    ///
    /// Fails if a range is inverted or out of bounds, a coarser LOD is not a
    /// subset of the finer one, or a row is inactive at LOD 0.
    pub fn resolve(&self, output_count: u32) -> Result<Vec<Lod>, ConfigError> {
        if self.ranges.is_empty() {
            return Err(ConfigError::NoLods);
        }
        if self.ranges.len() > MAX_LODS {
            return Err(ConfigError::TooManyLods {
                count: self.ranges.len(),
                max: MAX_LODS,
            });
        }

        let rows = output_count as usize;
        let mut previous = vec![true; rows];
        let mut active = vec![false; rows];
        let mut rank: Vec<Lod> = vec![0; rows];

        for (lod, ranges) in self.ranges.iter().enumerate() {
            let lod = lod as Lod;
            active.fill(false);

            for range in ranges {
                if range.start > range.end {
                    return Err(ConfigError::InvertedLodRange {
                        lod,
                        start: range.start,
                        end: range.end,
                    });
                }
                if range.end > output_count {
                    return Err(ConfigError::LodRangeOutOfBounds {
                        lod,
                        start: range.start,
                        end: range.end,
                        output_count,
                    });
                }
                active[range.start as usize..range.end as usize].fill(true);
            }

            for row in 0..rows {
                if !active[row] {
                    continue;
                }
                if !previous[row] {
                    return Err(ConfigError::NonNestedLod { lod, row: row as u32 });
                }
                rank[row] = lod;
            }

            if lod == 0 {
                if let Some(row) = active.iter().position(|&a| !a) {
                    return Err(ConfigError::UnassignedRow { row: row as u32 });
                }
            }

            core::mem::swap(&mut previous, &mut active);
        }

        Ok(rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_counts_rank() {
        let lods = LodSpec::from_row_counts(&[6, 4, 1]);
        let rank = lods.resolve(6).unwrap();
        assert_eq!(rank, vec![2, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_disjoint_ranges_rank() {
        let lods = LodSpec::new(vec![
            vec![0..10],
            vec![0..3, 7..10],
            vec![8..9],
        ]);
        let rank = lods.resolve(10).unwrap();
        assert_eq!(rank, vec![1, 1, 1, 0, 0, 0, 0, 1, 2, 1]);
    }

    #[test]
    fn test_overlapping_ranges_within_lod() {
        let lods = LodSpec::new(vec![vec![0..3, 2..5, 4..6]]);
        assert_eq!(lods.resolve(6).unwrap(), vec![0; 6]);
    }

    #[test]
    fn test_unassigned_row() {
        let lods = LodSpec::new(vec![vec![0..3, 4..6]]);
        assert_eq!(lods.resolve(6), Err(ConfigError::UnassignedRow { row: 3 }));
    }

    #[test]
    fn test_non_nested_lod() {
        let lods = LodSpec::new(vec![vec![0..6], vec![0..2], vec![1..4]]);
        assert_eq!(lods.resolve(6), Err(ConfigError::NonNestedLod { lod: 2, row: 2 }));

        let growing = LodSpec::from_row_counts(&[4, 6]);
        assert!(matches!(growing.resolve(6), Err(ConfigError::UnassignedRow { row: 4 })));
    }

    #[test]
    fn test_range_out_of_bounds() {
        let lods = LodSpec::new(vec![vec![0..8]]);
        assert!(matches!(
            lods.resolve(6),
            Err(ConfigError::LodRangeOutOfBounds { lod: 0, end: 8, output_count: 6, .. })
        ));
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn test_inverted_range() {
        let lods = LodSpec::new(vec![vec![0..6], vec![4..2]]);
        assert!(matches!(lods.resolve(6), Err(ConfigError::InvertedLodRange { lod: 1, .. })));
    }

    #[test]
    fn test_no_lods() {
        assert_eq!(LodSpec::new(Vec::new()).resolve(4), Err(ConfigError::NoLods));
        let too_many = LodSpec::uniform(4, MAX_LODS + 1);
        assert!(matches!(too_many.resolve(4), Err(ConfigError::TooManyLods { .. })));
    }

    #[test]
    fn test_empty_output() {
        let lods = LodSpec::from_row_counts(&[0, 0]);
        assert_eq!(lods.resolve(0).unwrap(), Vec::<Lod>::new());
    }
}
