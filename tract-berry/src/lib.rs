#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 从扩散 MRI 的局部纤维方向分布出发, 生成概率纤维束 (streamlines),
//! 并将纤维束压缩为一组按阈值递增排列的二值 "工作点" (operating point) 体数据.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 扩散信号的模型拟合 (张量, CSD, DSI) 不在本 crate 范围内.
//!   本 crate 只消费拟合后的 FA 图和方向分布 (SH 系数或离散 PMF).
//! 2. 同一次运行中所有体数据必须共享同一个体素网格 (形状 + 仿射矩阵),
//!   流水线入口处会检查, 不一致时直接返回 `Err`.
//! 3. 所有随机性都来自显式注入的随机数种子, 固定种子时结果逐点可复现.
//!
//! # 模块一览
//!
//! ### 体数据与网格 ✅
//!
//! 实现位于 `tract-berry/src/data`. 包括 NIfTI 读写, 仿射矩阵, 三线性插值.
//!
//! ### 离散球面与球谐基 ✅
//!
//! 实现位于 `tract-berry/src/sphere.rs` 和 `tract-berry/src/shm.rs`.
//!
//! ### 停止准则, 方向场, 种子, 追踪器 ✅
//!
//! 实现位于 `tract-berry/src/tracking`.
//!
//! ### 纤维束与 ROI 连通性过滤 ✅
//!
//! 实现位于 `tract-berry/src/streamline`.
//!
//! ### 访问计数, 高斯平滑, 对数阈值量化 ✅
//!
//! 实现位于 `tract-berry/src/density`.
//!
//! ### 配置与流水线 ✅
//!
//! 实现位于 `tract-berry/src/config.rs` 和 `tract-berry/src/pipeline.rs`.
//!
//! ### 数据集目录与输入发现 ✅
//!
//! 实现位于 `tract-berry/src/dataset.rs`. 命令行运行器位于 `runners/irontract`.

/// 三维体素索引 `(i, j, k)`, 与仿射矩阵的列顺序一致.
pub type Idx3d = (usize, usize, usize);

/// 体数据基础结构.
mod data;

pub use data::{
    interp, save, LabelVolume, MaskVolume, OdfVolume, ScalarVolume, Volume, VolumeAttr,
    VoxelGrid,
};

pub mod config;
pub mod consts;
pub mod dataset;
pub mod density;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod shm;
pub mod sphere;
pub mod streamline;
pub mod tracking;

pub use error::{TrackError, TrackResult};
