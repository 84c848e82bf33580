//! 通用常量.

/// ROI 标签相关.
pub mod label {
    /// ROI 体数据中, "不属于任何 ROI" 的标签值.
    pub const NO_ROI: i32 = 0;

    /// 标签是否属于某个 ROI?
    #[inline]
    pub const fn is_roi(label: i32) -> bool {
        label != NO_ROI
    }
}

/// 追踪参数默认值.
pub mod tracking {
    /// 相邻两步之间允许的最大转角 (单位: 度).
    pub const MAX_ANGLE_DEG: f64 = 20.0;

    /// 球谐 (HARDI/CSD) 方向场的相对概率质量门限.
    pub const SH_PMF_THRESHOLD: f64 = 0.1;

    /// 离散 PMF (DSI) 方向场的相对概率质量门限.
    pub const DSI_PMF_THRESHOLD: f64 = 0.01;

    /// 追踪步长 (单位: 毫米).
    pub const STEP_SIZE: f64 = 0.2;

    /// 单个方向上最多前进的步数.
    pub const MAX_STEPS: usize = 500;

    /// 每个种子最多使用的初始方向个数.
    pub const MAX_CROSS: usize = 1;

    /// FA 停止准则门限.
    pub const FA_THRESHOLD: f64 = 0.2;

    /// 每个种子体素默认撒下的随机种子点个数.
    pub const SEEDS_PER_VOXEL: u32 = 5000;

    /// 初始方向: 质量低于 `最大值 * 本值` 的顶点不作为初始方向.
    pub const RELATIVE_PEAK_THRESHOLD: f64 = 0.5;

    /// 初始方向: 两个初始方向之间的最小夹角 (单位: 度).
    pub const MIN_SEPARATION_ANGLE_DEG: f64 = 25.0;
}

/// 密度图量化参数默认值.
pub mod density {
    /// 纤维最小长度 (单位: 毫米). 长度不大于该值的纤维被丢弃.
    pub const MIN_LENGTH: f64 = 1.0;

    /// 高斯平滑的标准差 (单位: 体素).
    pub const SMOOTH_SIGMA: f64 = 0.5;

    /// 高斯核在 `truncate * sigma` 处截断.
    pub const GAUSSIAN_TRUNCATE: f64 = 4.0;

    /// 阈值量化的层数, 也是工作点个数的上限.
    pub const THRESHOLD_LEVELS: usize = 200;
}

/// 默认离散球面上的对称点对个数 (顶点总数为其两倍).
pub const DEFAULT_SPHERE_PAIRS: usize = 362;
