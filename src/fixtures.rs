//! Shared test fixtures

/// 24 controls into 75 outputs over 4 LODs
///
/// Rows are grouped into scopes that each build into exactly one block of a
/// known width when built on their own. Coefficients are multiples of 1/8 and
/// inputs multiples of 1/4, so every expected value is exact in `f32`.
pub mod block4 {
    #[cfg(not(feature = "std"))]
    use alloc::{vec, vec::Vec};
    use core::ops::Range;

    use crate::lod::LodSpec;
    use crate::storage::{BlockStorage, BlockWidth};

    pub const CONTROL_COUNT: usize = 24;
    pub const OUTPUT_COUNT: usize = 75;
    pub const LOD_COUNT: usize = 4;

    /// Row range expected to pack into a single block
    #[derive(Clone, Debug)]
    pub struct Scope {
        pub name: &'static str,
        pub rows: Range<usize>,
        pub width: BlockWidth,
    }

    const fn scope(name: &'static str, rows: Range<usize>, width: BlockWidth) -> Scope {
        Scope { name, rows, width }
    }

    pub const SCOPES: [Scope; 10] = [
        scope("Block4Padded", 0..1, BlockWidth::W4),
        scope("Block4Exact", 1..5, BlockWidth::W4),
        scope("Block8Padded", 5..12, BlockWidth::W8),
        scope("Block8Exact", 12..20, BlockWidth::W8),
        scope("Block12Padded", 20..29, BlockWidth::W12),
        scope("Block12Exact", 29..41, BlockWidth::W12),
        scope("Block16Padded", 41..55, BlockWidth::W16),
        scope("Block16Exact", 55..71, BlockWidth::W16),
        // Columns 3..7 only
        scope("InputRegionA", 71..73, BlockWidth::W4),
        // Columns 17, 18, 22, 23: two spans under the default column gap
        scope("InputRegionB", 73..75, BlockWidth::W4),
    ];

    pub fn lods() -> LodSpec {
        LodSpec::new(vec![
            vec![0..75],
            vec![0..48, 55..67, 71..75],
            vec![0..24, 55..60, 71..73],
            vec![0..10, 71..72],
        ])
    }

    /// Whole fixture matrix
    pub fn storage() -> BlockStorage {
        BlockStorage::build(TRIPLETS, CONTROL_COUNT as u32, OUTPUT_COUNT as u32, &lods()).unwrap()
    }

    /// Only the rows of `scope`, with the full extents and LODs
    pub fn storage_for(scope: &Scope) -> BlockStorage {
        let triplets: Vec<(u32, u32, f32)> = TRIPLETS
            .iter()
            .copied()
            .filter(|&(row, _, _)| scope.rows.contains(&(row as usize)))
            .collect();
        BlockStorage::build(&triplets, CONTROL_COUNT as u32, OUTPUT_COUNT as u32, &lods()).unwrap()
    }

    pub const TRIPLETS: &[(u32, u32, f32)] = &[
        (0, 4, 0.375), (0, 8, 0.125), (0, 10, -2.375), (0, 11, -0.75), (0, 22, -0.125),
        (1, 1, -0.125), (1, 3, 2.25), (1, 11, -1.875), (1, 13, -1.125), (1, 23, -1.625),
        (2, 6, -2.5),
        (3, 9, 0.625), (3, 13, -0.875),
        (4, 11, 0.75), (4, 19, -0.625), (4, 21, -2.125), (4, 23, 2.0),
        (5, 8, -0.75), (5, 11, -0.875), (5, 12, 1.75),
        (6, 13, -2.125), (6, 21, 0.5),
        (7, 10, 1.625),
        (8, 3, 1.0), (8, 11, 0.125), (8, 13, -2.125), (8, 21, -1.625),
        (9, 1, -0.875), (9, 5, 1.625), (9, 9, -2.5), (9, 19, 0.125), (9, 21, 1.75),
        (10, 7, -0.625),
        (11, 11, 0.875), (11, 16, -2.25), (11, 23, 1.875),
        (12, 2, -0.5), (12, 23, -0.5),
        (13, 19, 1.125),
        (14, 2, -0.625), (14, 4, 0.25), (14, 19, 1.0),
        (15, 1, -0.75), (15, 2, -1.25), (15, 9, 1.375), (15, 12, 2.375),
        (16, 1, 1.875), (16, 5, -2.125), (16, 9, 1.0), (16, 13, 0.125), (16, 19, -2.0), (16, 22, 0.5),
        (17, 3, -0.25), (17, 13, -2.5), (17, 22, 0.375),
        (18, 4, 2.25), (18, 5, -2.0), (18, 6, 0.25), (18, 10, 2.25), (18, 13, 0.875), (18, 23, -0.375),
        (19, 19, -2.25),
        (20, 15, -0.125), (20, 17, -0.125), (20, 18, -0.625), (20, 20, 0.75),
        (21, 2, -0.75), (21, 5, -1.125), (21, 9, 0.875), (21, 16, 0.5), (21, 17, 0.375), (21, 20, -1.0),
        (22, 0, -0.625), (22, 14, -2.5), (22, 21, -1.75), (22, 23, 0.375),
        (23, 4, -0.625), (23, 10, 1.625), (23, 11, 1.125), (23, 19, 0.875), (23, 22, 1.625),
        (24, 19, -2.125),
        (25, 0, -2.25), (25, 3, 1.625), (25, 5, -0.375), (25, 14, -2.125), (25, 17, 0.75), (25, 19, -0.25),
        (26, 0, 1.0), (26, 23, -0.25),
        (27, 5, 0.5), (27, 8, -2.25),
        (28, 0, -0.25), (28, 3, -1.75), (28, 4, 1.875), (28, 5, 1.375), (28, 10, 0.375), (28, 19, 0.25),
        (29, 4, 0.625), (29, 6, 2.0), (29, 11, 0.25),
        (30, 0, 0.625), (30, 5, -2.0), (30, 8, -0.625), (30, 10, 0.625), (30, 15, 0.875), (30, 19, -0.5),
        (31, 5, 1.75), (31, 9, 1.25), (31, 14, 1.125),
        (32, 10, 2.375), (32, 11, -0.125), (32, 17, -2.5), (32, 20, 2.0), (32, 22, -1.625),
        (33, 0, -1.25),
        (34, 22, 1.875),
        (35, 0, 2.375), (35, 9, -1.125), (35, 12, 1.75), (35, 21, -0.375),
        (36, 0, -2.125), (36, 2, -2.0), (36, 3, 0.25), (36, 5, -1.5), (36, 9, -0.75), (36, 14, 2.25),
        (37, 4, -2.0), (37, 10, 1.375), (37, 19, -0.25), (37, 23, -1.75),
        (38, 14, 0.125), (38, 16, 1.5), (38, 17, 1.375), (38, 22, -2.0),
        (39, 3, 2.0), (39, 11, 2.125), (39, 15, 1.125), (39, 17, 2.125),
        (40, 11, -1.0),
        (41, 9, 1.75), (41, 10, -1.375), (41, 11, 2.5), (41, 14, -1.25), (41, 16, 1.125), (41, 21, 1.0),
        (42, 6, -1.25), (42, 11, -0.625), (42, 12, 1.25), (42, 14, -1.5), (42, 23, -1.125),
        (43, 0, -0.875), (43, 21, -1.375), (43, 22, 1.625),
        (44, 18, 2.25),
        (45, 0, 2.5), (45, 1, -1.625), (45, 15, -0.75), (45, 23, -0.5),
        (46, 0, 0.625), (46, 21, 1.25),
        (47, 9, 0.125),
        (48, 3, -0.875), (48, 5, -1.625), (48, 6, 1.5), (48, 14, 0.875), (48, 17, -0.5), (48, 20, 0.375),
        (49, 6, -2.0), (49, 10, -1.125), (49, 13, 1.875), (49, 16, 2.5), (49, 19, -1.5),
        (50, 3, -0.875), (50, 4, 1.0), (50, 8, 0.375), (50, 10, -1.625), (50, 20, 1.5),
        (51, 14, 1.875),
        (52, 10, -1.375), (52, 14, -1.0),
        (53, 4, -2.25), (53, 6, -1.5), (53, 12, 0.625),
        (54, 9, 0.125), (54, 13, -2.0), (54, 14, -2.5), (54, 19, -2.125), (54, 22, 1.0),
        (55, 0, 1.5), (55, 12, 0.875), (55, 17, 2.5), (55, 22, -2.25), (55, 23, -2.5),
        (56, 0, -2.5), (56, 12, 1.0), (56, 15, -0.75), (56, 23, -2.125),
        (57, 1, -1.5), (57, 7, 0.125), (57, 18, -2.125),
        (58, 1, 2.0), (58, 6, 0.875), (58, 8, 2.375), (58, 12, -1.875), (58, 14, -1.75), (58, 20, -1.0),
        (59, 1, 1.125), (59, 3, 1.375), (59, 13, -2.375), (59, 17, 0.375), (59, 21, -0.125), (59, 23, 0.875),
        (60, 9, -0.25),
        (61, 21, 2.375),
        (62, 1, -0.875), (62, 3, 1.5), (62, 4, -1.25), (62, 11, 0.125), (62, 23, 0.375),
        (63, 2, 0.375), (63, 3, -2.25), (63, 10, 0.625), (63, 13, 0.5), (63, 15, -0.375), (63, 23, 1.25),
        (64, 0, 1.75), (64, 5, 1.5), (64, 6, 0.25),
        (65, 6, -1.25), (65, 15, -0.125), (65, 22, -1.625), (65, 23, 0.875),
        (66, 1, 0.375), (66, 4, -2.25), (66, 6, 2.5), (66, 11, -0.625), (66, 17, -2.125),
        (67, 2, 1.625), (67, 15, 2.0), (67, 17, -1.625),
        (68, 8, 2.125), (68, 9, -0.125), (68, 10, 1.0), (68, 15, 1.0), (68, 19, 1.375), (68, 22, -0.625),
        (69, 14, -2.375), (69, 17, -0.125),
        (70, 4, 1.0), (70, 6, -2.5), (70, 9, 1.125),
        (71, 3, 1.25), (71, 5, 0.5), (71, 6, 1.125),
        (72, 3, -1.0), (72, 4, 2.25), (72, 6, 0.875),
        (73, 17, 1.75), (73, 23, 1.375),
        (74, 17, -1.0), (74, 22, -1.375), (74, 23, -0.375),
    ];

    /// Caller-visible control values
    pub const INPUT: [f32; CONTROL_COUNT] = [
        -2.0, 1.0, -0.75, -0.5, -1.0, -2.0, -1.75, 0.25,
        -2.75, 1.0, 1.5, 0.75, 3.0, -1.25, 0.0, -2.25,
        2.0, 1.75, -0.5, -3.0, -1.75, -1.25, 1.0, -0.75,
    ];

    /// Expected outputs per LOD; rows inactive at a LOD stay `0.0`
    pub const VALUES_PER_LOD: [[f32; OUTPUT_COUNT]; LOD_COUNT] = [
        [
            -4.96875, -0.03125, 4.375, 1.71875, 3.59375, 6.65625, 2.03125, 2.4375, 4.28125, -9.1875,
            -0.15625, -5.25, 0.75, -3.375, -2.78125, 8.6875, 13.46875, 3.625, 3.875, 6.75,
            -0.9375, 7.09375, 3.15625, 2.90625, 6.375, 6.5, -1.8125, 5.1875, -3.4375, -3.9375,
            4.9375, -2.25, -6.03125, 2.5, 1.875, -0.15625, 7.875, 6.125, 3.40625, 1.78125,
            -0.75, 2.5625, 6.3125, 5.09375, -1.125, -4.5625, -2.8125, 0.125, -0.46875, 8.96875,
            -6.65625, 0.0, -2.0625, 6.75, 10.0, 3.625, 11.28125, -0.40625, -9.9375, 3.5625,
            -0.25, -2.96875, -0.5625, 1.0625, -6.9375, 0.1875, -5.9375, -8.5625, -11.46875, -0.21875,
            4.5, -3.59375, -3.28125, 2.03125, -2.84375,
        ],
        [
            -4.96875, -0.03125, 4.375, 1.71875, 3.59375, 6.65625, 2.03125, 2.4375, 4.28125, -9.1875,
            -0.15625, -5.25, 0.75, -3.375, -2.78125, 8.6875, 13.46875, 3.625, 3.875, 6.75,
            -0.9375, 7.09375, 3.15625, 2.90625, 6.375, 6.5, -1.8125, 5.1875, -3.4375, -3.9375,
            4.9375, -2.25, -6.03125, 2.5, 1.875, -0.15625, 7.875, 6.125, 3.40625, 1.78125,
            -0.75, 2.5625, 6.3125, 5.09375, -1.125, -4.5625, -2.8125, 0.125, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 3.625, 11.28125, -0.40625, -9.9375, 3.5625,
            -0.25, -2.96875, -0.5625, 1.0625, -6.9375, 0.1875, -5.9375, 0.0, 0.0, 0.0,
            0.0, -3.59375, -3.28125, 2.03125, -2.84375,
        ],
        [
            -4.96875, -0.03125, 4.375, 1.71875, 3.59375, 6.65625, 2.03125, 2.4375, 4.28125, -9.1875,
            -0.15625, -5.25, 0.75, -3.375, -2.78125, 8.6875, 13.46875, 3.625, 3.875, 6.75,
            -0.9375, 7.09375, 3.15625, 2.90625, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 3.625, 11.28125, -0.40625, -9.9375, 3.5625,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, -3.59375, -3.28125, 0.0, 0.0,
        ],
        [
            -4.96875, -0.03125, 4.375, 1.71875, 3.59375, 6.65625, 2.03125, 2.4375, 4.28125, -9.1875,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, -3.59375, 0.0, 0.0, 0.0,
        ],
    ];
}
