//! 从二值掩膜生成种子点.
//!
//! 种子以物理坐标 (毫米) 存储, 顺序在固定随机种子下是确定的.

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{MaskVolume, TrackError, TrackResult, VolumeAttr};

/// 种子密度.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SeedDensity {
    /// 每个掩膜体素内随机撒下给定个数的种子.
    PerVoxel(usize),

    /// 在整个掩膜内随机撒下给定总数的种子 (各体素尽量均匀).
    Total(usize),

    /// 每个掩膜体素内放置规则的 `nx * ny * nz` 子体素网格.
    Grid([usize; 3]),
}

impl Default for SeedDensity {
    #[inline]
    fn default() -> Self {
        Self::PerVoxel(crate::consts::tracking::SEEDS_PER_VOXEL as usize)
    }
}

/// 有序种子集合 (物理坐标).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedSet {
    points: Vec<DVec3>,
}

impl SeedSet {
    /// 直接以物理坐标创建.
    #[inline]
    pub fn new(points: Vec<DVec3>) -> Self {
        Self { points }
    }

    /// 按 `density` 从掩膜 `mask` 生成种子. 随机密度使用随机种子 `seed`.
    pub fn from_mask(mask: &MaskVolume, density: SeedDensity, seed: u64) -> TrackResult<Self> {
        match density {
            SeedDensity::PerVoxel(n) => Ok(random_seeds_from_mask(mask, n, true, seed)),
            SeedDensity::Total(n) => Ok(random_seeds_from_mask(mask, n, false, seed)),
            SeedDensity::Grid(d) => seeds_from_mask(mask, d),
        }
    }

    /// 种子点.
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 种子个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有种子.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 在掩膜内随机撒种子.
///
/// 共进行若干轮, 每轮按行优先顺序遍历所有掩膜体素, 在每个体素 `idx` 内放置一个
/// 均匀分布于 `[idx - 0.5, idx + 0.5)^3` 的点.
///
/// - `per_voxel == true` 时进行 `count` 轮;
/// - 否则进行 `count / 体素数 + 1` 轮, 再截断为前 `count` 个.
///
/// 掩膜为空时得到空集合.
pub fn random_seeds_from_mask(mask: &MaskVolume, count: usize, per_voxel: bool, seed: u64) -> SeedSet {
    let voxels = mask.true_voxels();
    if voxels.is_empty() || count == 0 {
        return SeedSet::default();
    }
    let rounds = if per_voxel {
        count
    } else {
        count / voxels.len() + 1
    };

    let grid = mask.grid();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    // 追踪时第 `i` 个种子使用第 `i` 条随机流, 这里使用最后一条.
    rng.set_stream(u64::MAX);
    let mut points = Vec::with_capacity(rounds * voxels.len());
    for _ in 0..rounds {
        for &(i, j, k) in voxels.iter() {
            let jitter = DVec3::new(rng.random(), rng.random(), rng.random()) - DVec3::splat(0.5);
            let p = DVec3::new(i as f64, j as f64, k as f64) + jitter;
            points.push(grid.voxel_to_world(p));
        }
    }
    if !per_voxel {
        points.truncate(count);
    }
    SeedSet::new(points)
}

/// 在每个掩膜体素内放置规则的子体素网格.
///
/// 每个轴上 `d` 个点位于 `(g + 0.5) / d - 0.5`, `g = 0..d`. 体素按行优先顺序遍历,
/// 体素内的点同样按行优先顺序排列.
///
/// 任何一个轴的密度为 0 时返回 `Err(TrackError::InvalidConfig)`.
pub fn seeds_from_mask(mask: &MaskVolume, density: [usize; 3]) -> TrackResult<SeedSet> {
    if density.contains(&0) {
        return Err(TrackError::InvalidConfig("seed grid density must be positive"));
    }
    let offsets = density.map(|d| {
        (0..d)
            .map(|g| (g as f64 + 0.5) / d as f64 - 0.5)
            .collect::<Vec<_>>()
    });
    let grid = mask.grid();
    let voxels = mask.true_voxels();
    let mut points = Vec::with_capacity(voxels.len() * density.iter().product::<usize>());
    for (i, j, k) in voxels {
        for &dx in &offsets[0] {
            for &dy in &offsets[1] {
                for &dz in &offsets[2] {
                    let p = DVec3::new(i as f64 + dx, j as f64 + dy, k as f64 + dz);
                    points.push(grid.voxel_to_world(p));
                }
            }
        }
    }
    Ok(SeedSet::new(points))
}
