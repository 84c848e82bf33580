//! 概率纤维追踪.
//!
//! 所有位置在追踪内部都使用连续体素坐标, 只有种子 (输入) 和纤维 (输出) 使用物理坐标.
//! 体素 `(i, j, k)` 的中心位于连续坐标 `(i, j, k)`.

mod direction;
mod seeds;
mod stopping;
mod tracker;

pub use direction::{DirectionField, DirectionGetter, PmfSource, WalkContext};
pub use seeds::{random_seeds_from_mask, seeds_from_mask, SeedDensity, SeedSet};
pub use stopping::{
    BinaryStoppingCriterion, StoppingCriterion, ThresholdStoppingCriterion, TrackStatus,
};
pub use tracker::{LocalTracker, TrackerParams};
