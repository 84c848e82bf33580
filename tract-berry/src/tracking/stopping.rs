//! 停止准则.
//!
//! 停止准则在连续体素坐标上判断追踪能否继续. 判断没有副作用,
//! 同一位置总是给出相同结果.

use glam::DVec3;

use crate::interp::trilinear;
use crate::{MaskVolume, ScalarVolume, VolumeAttr, VoxelGrid};

/// 单点的追踪状态.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// 可以继续追踪.
    Trackpoint,

    /// 位于图像内, 但已不满足追踪条件.
    Endpoint,

    /// 位于图像外.
    OutsideImage,
}

/// 停止准则. 追踪器在多个线程间共享同一个停止准则, 因此要求 `Sync`.
pub trait StoppingCriterion: Sync {
    /// 停止准则所在的体素网格.
    fn grid(&self) -> &VoxelGrid;

    /// 判断连续体素坐标 `p` 的追踪状态.
    fn check_point(&self, p: DVec3) -> TrackStatus;

    /// 连续体素坐标 `p` 处能否继续追踪.
    #[inline]
    fn is_valid(&self, p: DVec3) -> bool {
        self.check_point(p) == TrackStatus::Trackpoint
    }
}

/// 阈值停止准则: 三线性插值标量场 (通常为 FA), 不低于阈值时可以继续.
#[derive(Debug, Clone)]
pub struct ThresholdStoppingCriterion {
    metric: ScalarVolume,
    threshold: f64,
}

impl ThresholdStoppingCriterion {
    /// 以标量场 `metric` 和阈值 `threshold` 创建.
    #[inline]
    pub fn new(metric: ScalarVolume, threshold: f64) -> Self {
        Self { metric, threshold }
    }

    /// 阈值.
    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 标量场.
    #[inline]
    pub fn metric(&self) -> &ScalarVolume {
        &self.metric
    }
}

impl StoppingCriterion for ThresholdStoppingCriterion {
    #[inline]
    fn grid(&self) -> &VoxelGrid {
        self.metric.grid()
    }

    fn check_point(&self, p: DVec3) -> TrackStatus {
        match trilinear(&self.metric.data(), p) {
            None => TrackStatus::OutsideImage,
            Some(v) if v >= self.threshold => TrackStatus::Trackpoint,
            Some(_) => TrackStatus::Endpoint,
        }
    }
}

/// 二值停止准则: 最近体素在掩膜内时可以继续.
#[derive(Debug, Clone)]
pub struct BinaryStoppingCriterion {
    mask: MaskVolume,
}

impl BinaryStoppingCriterion {
    /// 以掩膜 `mask` 创建.
    #[inline]
    pub fn new(mask: MaskVolume) -> Self {
        Self { mask }
    }
}

impl StoppingCriterion for BinaryStoppingCriterion {
    #[inline]
    fn grid(&self) -> &VoxelGrid {
        self.mask.grid()
    }

    fn check_point(&self, p: DVec3) -> TrackStatus {
        match self.mask.grid().nearest_voxel(p) {
            None => TrackStatus::OutsideImage,
            Some(idx) if self.mask[idx] => TrackStatus::Trackpoint,
            Some(_) => TrackStatus::Endpoint,
        }
    }
}
