//! 纤维集合 -> 按阈值递增排列的二值工作点.
//!
//! 1. 丢弃长度不大于 `min_length` 的纤维;
//! 2. 访问计数;
//! 3. 高斯平滑;
//! 4. `log10(density + 1)`;
//! 5. 记最大值为 `M`, 步长 `M / levels`, 第 `i` 个阈值为 `i * step` (只取小于 `M` 的),
//!   对应的掩膜为 `log_density >= threshold`.
//!
//! `M` 为 0 (或非有限值) 时工作点序列为空.

use std::sync::Arc;

use ndarray::{Array3, ArrayView3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{density_map, gaussian_filter, VisitCounting};
use crate::consts::density::{MIN_LENGTH, SMOOTH_SIGMA, THRESHOLD_LEVELS};
use crate::streamline::Bundle;
use crate::{TrackError, TrackResult, VoxelGrid};

/// 密度量化参数.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DensityQuantizer {
    min_length: f64,
    sigma: f64,
    levels: usize,
    counting: VisitCounting,
}

impl Default for DensityQuantizer {
    fn default() -> Self {
        Self {
            min_length: MIN_LENGTH,
            sigma: SMOOTH_SIGMA,
            levels: THRESHOLD_LEVELS,
            counting: VisitCounting::default(),
        }
    }
}

impl DensityQuantizer {
    /// 设置纤维最小长度 (毫米).
    #[inline]
    pub fn with_min_length(mut self, min_length: f64) -> Self {
        self.min_length = min_length;
        self
    }

    /// 设置高斯平滑标准差 (体素). 0 表示不平滑.
    #[inline]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// 设置阈值层数.
    #[inline]
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// 设置访问计数方式.
    #[inline]
    pub fn with_counting(mut self, counting: VisitCounting) -> Self {
        self.counting = counting;
        self
    }

    /// 纤维最小长度.
    #[inline]
    pub fn min_length(&self) -> f64 {
        self.min_length
    }

    /// 高斯平滑标准差.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// 阈值层数.
    #[inline]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// 访问计数方式.
    #[inline]
    pub fn counting(&self) -> VisitCounting {
        self.counting
    }

    /// 检查参数是否合法.
    pub fn validate(&self) -> TrackResult<()> {
        if !(self.min_length >= 0.0 && self.min_length.is_finite()) {
            return Err(TrackError::InvalidConfig("min length must be non-negative"));
        }
        if !(self.sigma >= 0.0 && self.sigma.is_finite()) {
            return Err(TrackError::InvalidConfig("smoothing sigma must be non-negative"));
        }
        if self.levels == 0 {
            return Err(TrackError::InvalidConfig("threshold levels must be positive"));
        }
        Ok(())
    }

    /// 经过长度过滤后, 在 `grid` 上的访问计数图.
    pub fn density(&self, bundle: &Bundle, grid: &VoxelGrid) -> Array3<f32> {
        let kept = bundle.longer_than(self.min_length);
        log::debug!(
            "{} of {} streamlines are longer than {} mm",
            kept.len(),
            bundle.len(),
            self.min_length
        );
        density_map(&kept, grid, self.counting).mapv(|c| c as f32)
    }

    /// 平滑并取对数.
    pub fn log_density(&self, density: &Array3<f32>) -> LogDensity {
        let smoothed = gaussian_filter(density, self.sigma);
        LogDensity::new(smoothed.mapv(|v| (v + 1.0).log10()))
    }

    /// 由访问计数图生成工作点序列.
    #[inline]
    pub fn operating_points(&self, density: Array3<f32>) -> OperatingPoints {
        self.log_density(&density).into_operating_points(self.levels)
    }

    /// 完整的量化流程: 长度过滤, 计数, 平滑, 取对数, 阈值.
    pub fn quantize(&self, bundle: &Bundle, grid: &VoxelGrid) -> OperatingPoints {
        self.operating_points(self.density(bundle, grid))
    }
}

/// 对数密度图及其最大值.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDensity {
    data: Array3<f32>,
    max: f32,
}

impl LogDensity {
    /// 以对数密度 `data` 创建. NaN 不参与最大值计算.
    pub fn new(data: Array3<f32>) -> Self {
        let max = data.iter().copied().fold(0.0f32, f32::max);
        Self { data, max }
    }

    /// 对数密度.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 最大值 `M`. 全为 0 (或为空) 时为 0.
    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// 分 `levels` 层生成工作点序列.
    pub fn into_operating_points(self, levels: usize) -> OperatingPoints {
        let m = self.max;
        let (step, len) = if m > 0.0 && m.is_finite() && levels > 0 {
            let step = m / levels as f32;
            let len = (0..levels).take_while(|&i| (i as f32) * step < m).count();
            (step, len)
        } else {
            (0.0, 0)
        };
        log::debug!("log density max {m}, {len} operating points");
        OperatingPoints {
            log: Arc::new(self),
            step,
            next: 0,
            len,
        }
    }
}

/// 一个工作点: 序号, 阈值, 二值掩膜 (0/1).
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingPoint {
    index: usize,
    threshold: f32,
    mask: Array3<u8>,
}

impl OperatingPoint {
    /// 序号, 从 0 开始.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// 阈值.
    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 掩膜.
    #[inline]
    pub fn mask(&self) -> ArrayView3<'_, u8> {
        self.mask.view()
    }

    /// 消费自我, 获得掩膜.
    #[inline]
    pub fn into_mask(self) -> Array3<u8> {
        self.mask
    }

    /// 掩膜内体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|v| **v != 0).count()
    }
}

/// 工作点序列. 惰性求值, 有限, 克隆后可以从当前位置重新迭代.
///
/// 阈值严格递增, 因此后一个掩膜总是前一个掩膜的子集.
#[derive(Debug, Clone)]
pub struct OperatingPoints {
    log: Arc<LogDensity>,
    step: f32,
    next: usize,
    len: usize,
}

impl OperatingPoints {
    /// 底层对数密度图.
    #[inline]
    pub fn log_density(&self) -> &LogDensity {
        &self.log
    }

    /// 全部阈值 (不受迭代进度影响).
    pub fn thresholds(&self) -> Vec<f32> {
        (0..self.len).map(|i| i as f32 * self.step).collect()
    }

    /// 回到第一个工作点.
    #[inline]
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for OperatingPoints {
    type Item = OperatingPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let threshold = index as f32 * self.step;
        let mask = self.log.data.mapv(|v| u8::from(v >= threshold));
        Some(OperatingPoint {
            index,
            threshold,
            mask,
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.len - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for OperatingPoints {}

impl std::iter::FusedIterator for OperatingPoints {}
