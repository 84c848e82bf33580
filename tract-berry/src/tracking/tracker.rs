//! 双向概率追踪.

use glam::DVec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{DirectionGetter, SeedSet, StoppingCriterion, WalkContext};
use crate::consts::tracking::{MAX_CROSS, MAX_STEPS, STEP_SIZE};
use crate::streamline::{Bundle, Streamline};
use crate::{TrackError, TrackResult, VoxelGrid};

/// 追踪参数.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackerParams {
    /// 步长 (毫米).
    pub step_size: f64,

    /// 单个方向上最多前进的步数. 这是追踪终止的硬性保证.
    pub max_steps: usize,

    /// 每个种子最多使用的初始方向个数.
    pub max_cross: usize,

    /// 全局随机种子.
    pub random_seed: u64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            step_size: STEP_SIZE,
            max_steps: MAX_STEPS,
            max_cross: MAX_CROSS,
            random_seed: 0,
        }
    }
}

impl TrackerParams {
    /// 检查参数是否合法.
    pub fn validate(&self) -> TrackResult<()> {
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(TrackError::InvalidConfig("step size must be positive"));
        }
        if self.max_steps == 0 {
            return Err(TrackError::InvalidConfig("max steps must be positive"));
        }
        if self.max_cross == 0 {
            return Err(TrackError::InvalidConfig("max cross must be positive"));
        }
        Ok(())
    }
}

/// 局部概率追踪器.
///
/// 对每个种子的每个初始方向 `d`, 分别沿 `d` 和 `-d` 各走一次, 得到的纤维为
/// "反向走过的点 (逆序, 不含种子) + 正向走过的点 (含种子)".
///
/// 每一步:
///
/// 1. 当前位置不满足停止准则时终止;
/// 2. 以上一步方向抽样下一步方向, 方向场要求终止时终止;
/// 3. 沿该方向前进 `step_size` 毫米 (按各轴体素尺寸换算为体素单位), 记录新位置.
///
/// 方向场与停止准则共享同一网格; 该网格在 [`LocalTracker::new`] 中检查.
pub struct LocalTracker<'a, D: ?Sized, S: ?Sized> {
    getter: &'a D,
    criterion: &'a S,
    params: TrackerParams,
    step: DVec3,
}

impl<'a, D, S> LocalTracker<'a, D, S>
where
    D: DirectionGetter + ?Sized,
    S: StoppingCriterion + ?Sized,
{
    /// 创建追踪器.
    ///
    /// 参数非法时返回 `Err(TrackError::InvalidConfig)`;
    /// 方向场与停止准则网格不一致时返回 `Err(TrackError::GridMismatch)`.
    pub fn new(getter: &'a D, criterion: &'a S, params: TrackerParams) -> TrackResult<Self> {
        params.validate()?;
        if !getter.grid().matches(criterion.grid()) {
            return Err(TrackError::GridMismatch("direction field", "stopping criterion"));
        }
        let step = DVec3::splat(params.step_size) / getter.grid().voxel_size();
        Ok(Self {
            getter,
            criterion,
            params,
            step,
        })
    }

    /// 追踪参数.
    #[inline]
    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    #[inline]
    fn grid(&self) -> &VoxelGrid {
        self.getter.grid()
    }

    /// 从体素坐标 `seed` 沿 `dir` 单向行走. 返回的点列以种子开头.
    fn walk(&self, seed: DVec3, dir: DVec3, ctx: &mut WalkContext) -> Vec<DVec3> {
        let mut points = vec![seed];
        let (mut pos, mut dir) = (seed, dir);
        for _ in 0..self.params.max_steps {
            if !self.criterion.is_valid(pos) {
                break;
            }
            let Some(next) = self.getter.next_direction(pos, dir, ctx) else {
                break;
            };
            dir = next;
            pos += dir * self.step;
            points.push(pos);
        }
        points
    }

    /// 追踪第 `index` 个种子 (物理坐标 `seed`). 每个初始方向产生一条纤维;
    /// 没有初始方向时产生只含种子的单点纤维.
    pub fn track_seed(&self, index: usize, seed: DVec3) -> Vec<Streamline> {
        let grid = self.grid();
        let mut ctx = WalkContext::for_seed(self.params.random_seed, index as u64);
        let s = grid.world_to_voxel(seed);

        let dirs = self.getter.initial_directions(s, self.params.max_cross, &mut ctx);
        if dirs.is_empty() {
            return vec![Streamline::new(vec![seed])];
        }
        dirs.into_iter()
            .map(|d| {
                let forward = self.walk(s, d, &mut ctx);
                let backward = self.walk(s, -d, &mut ctx);
                let points = backward
                    .into_iter()
                    .skip(1)
                    .rev()
                    .chain(forward)
                    .map(|p| grid.voxel_to_world(p))
                    .collect();
                Streamline::new(points)
            })
            .collect()
    }

    /// 按种子顺序追踪所有种子.
    pub fn track(&self, seeds: &SeedSet) -> Bundle {
        seeds
            .points()
            .iter()
            .enumerate()
            .flat_map(|(i, &s)| self.track_seed(i, s))
            .collect()
    }
}

#[cfg(feature = "rayon")]
impl<'a, D, S> LocalTracker<'a, D, S>
where
    D: DirectionGetter + ?Sized,
    S: StoppingCriterion + ?Sized,
{
    /// 借助 `rayon` 并行追踪所有种子. 每个种子使用自己的随机流,
    /// 因此结果与 [`LocalTracker::track`] 完全相同.
    pub fn par_track(&self, seeds: &SeedSet) -> Bundle {
        use rayon::prelude::*;

        let per_seed: Vec<Vec<Streamline>> = seeds
            .points()
            .par_iter()
            .enumerate()
            .map(|(i, &s)| self.track_seed(i, s))
            .collect();
        per_seed.into_iter().flatten().collect()
    }
}
