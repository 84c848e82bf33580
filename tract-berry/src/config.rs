//! 运行配置.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::tracking::{
    DSI_PMF_THRESHOLD, FA_THRESHOLD, MAX_ANGLE_DEG, SH_PMF_THRESHOLD,
};
use crate::density::{DensityQuantizer, VisitCounting};
use crate::streamline::RoiPair;
use crate::tracking::{SeedDensity, TrackerParams};
use crate::{TrackError, TrackResult};

/// 数据集类型, 决定方向场的数据形式.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DatasetVariant {
    /// 多壳层 HARDI 数据 (例如 HCP-like). 方向场为 CSD 拟合得到的球谐系数.
    Hardi,

    /// DSI 数据. 方向场为球面上的离散 PMF.
    Dsi,
}

impl DatasetVariant {
    /// 该类型默认的相对概率质量门限.
    #[inline]
    pub const fn default_pmf_threshold(self) -> f64 {
        match self {
            Self::Hardi => SH_PMF_THRESHOLD,
            Self::Dsi => DSI_PMF_THRESHOLD,
        }
    }

    /// 方向场是否必须附带拟合时所用的球面顶点表? 只有离散 PMF 需要.
    #[inline]
    pub const fn needs_sphere(self) -> bool {
        matches!(self, Self::Dsi)
    }
}

/// 接受 `HCPL`/`HARDI` 与 `DSI` (不区分大小写).
impl FromStr for DatasetVariant {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HCPL" | "HARDI" => Ok(Self::Hardi),
            "DSI" => Ok(Self::Dsi),
            _ => Err(TrackError::UnsupportedVariant(s.to_string())),
        }
    }
}

impl Display for DatasetVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hardi => "HARDI",
            Self::Dsi => "DSI",
        })
    }
}

/// 密度产品类型.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProductKind {
    /// 只做长度过滤.
    LengthFiltered,

    /// 长度过滤后, 再只保留连通目标 ROI 对的纤维.
    RoiFiltered,
}

impl ProductKind {
    /// 简短名字, 用于文件与目录命名.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LengthFiltered => "epfl",
            Self::RoiFiltered => "vumc",
        }
    }
}

impl Display for ProductKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 后处理方式.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PostProcessing {
    /// 只做长度过滤 (`EPFL`).
    #[default]
    LengthOnly,

    /// 长度过滤 + ROI 连通性过滤 (`VUMC`).
    RoiConnectivity,

    /// 两种产品都生成 (`ALL`).
    All,
}

impl PostProcessing {
    /// 需要生成的产品, 按生成顺序排列.
    pub const fn products(self) -> &'static [ProductKind] {
        match self {
            Self::LengthOnly => &[ProductKind::LengthFiltered],
            Self::RoiConnectivity => &[ProductKind::RoiFiltered],
            Self::All => &[ProductKind::LengthFiltered, ProductKind::RoiFiltered],
        }
    }

    /// 是否需要 ROI 体数据.
    #[inline]
    pub const fn needs_rois(self) -> bool {
        !matches!(self, Self::LengthOnly)
    }
}

/// 接受 `EPFL`, `VUMC`, `ALL` (不区分大小写).
impl FromStr for PostProcessing {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EPFL" => Ok(Self::LengthOnly),
            "VUMC" => Ok(Self::RoiConnectivity),
            "ALL" => Ok(Self::All),
            _ => Err(TrackError::UnsupportedPostProcessing(s.to_string())),
        }
    }
}

/// 一次运行的全部配置.
///
/// 以 [`TrackingConfig::new`] 获得某数据集类型的默认配置, 再以 `with_*` 逐项修改.
/// 修改完成后应当调用 [`TrackingConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackingConfig {
    variant: DatasetVariant,
    postprocessing: PostProcessing,
    max_angle_deg: f64,
    pmf_threshold: f64,
    fa_threshold: f64,
    seeds: SeedDensity,
    tracker: TrackerParams,
    quantizer: DensityQuantizer,
    roi_pair: RoiPair,
}

impl TrackingConfig {
    /// 数据集类型 `variant` 的默认配置.
    pub fn new(variant: DatasetVariant) -> Self {
        Self {
            variant,
            postprocessing: PostProcessing::default(),
            max_angle_deg: MAX_ANGLE_DEG,
            pmf_threshold: variant.default_pmf_threshold(),
            fa_threshold: FA_THRESHOLD,
            seeds: SeedDensity::default(),
            tracker: TrackerParams::default(),
            quantizer: DensityQuantizer::default(),
            roi_pair: RoiPair::default(),
        }
    }

    /// 检查配置是否合法.
    pub fn validate(&self) -> TrackResult<()> {
        if !(self.max_angle_deg > 0.0 && self.max_angle_deg <= 90.0) {
            return Err(TrackError::InvalidConfig("max angle must be in (0, 90] degrees"));
        }
        if !(0.0..=1.0).contains(&self.pmf_threshold) {
            return Err(TrackError::InvalidConfig("pmf threshold must be in [0, 1]"));
        }
        if !self.fa_threshold.is_finite() {
            return Err(TrackError::InvalidConfig("fa threshold must be finite"));
        }
        if let SeedDensity::Grid(d) = self.seeds {
            if d.contains(&0) {
                return Err(TrackError::InvalidConfig("seed grid density must be positive"));
            }
        }
        self.tracker.validate()?;
        self.quantizer.validate()
    }
}

macro_rules! impl_with {
    ($($(#[$doc: meta])* $name: ident($($field: ident).+: $t: ty);)+) => {
        impl TrackingConfig {
            $(
                $(#[$doc])*
                #[inline]
                pub fn $name(mut self, value: $t) -> Self {
                    self.$($field).+ = value;
                    self
                }
            )+
        }
    };
}

impl_with! {
    /// 设置后处理方式.
    with_postprocessing(postprocessing: PostProcessing);
    /// 设置相邻两步之间的最大转角 (度).
    with_max_angle(max_angle_deg: f64);
    /// 设置相对概率质量门限.
    with_pmf_threshold(pmf_threshold: f64);
    /// 设置 FA 停止门限.
    with_fa_threshold(fa_threshold: f64);
    /// 设置种子密度.
    with_seed_density(seeds: SeedDensity);
    /// 设置步长 (毫米).
    with_step_size(tracker.step_size: f64);
    /// 设置单方向最大步数.
    with_max_steps(tracker.max_steps: usize);
    /// 设置每个种子最多使用的初始方向个数.
    with_max_cross(tracker.max_cross: usize);
    /// 设置全局随机种子.
    with_random_seed(tracker.random_seed: u64);
    /// 设置目标 ROI 对.
    with_roi_pair(roi_pair: RoiPair);
}

impl TrackingConfig {
    /// 设置纤维最小长度 (毫米).
    #[inline]
    pub fn with_min_length(mut self, min_length: f64) -> Self {
        self.quantizer = self.quantizer.with_min_length(min_length);
        self
    }

    /// 设置高斯平滑标准差 (体素).
    #[inline]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.quantizer = self.quantizer.with_sigma(sigma);
        self
    }

    /// 设置访问计数方式.
    #[inline]
    pub fn with_counting(mut self, counting: VisitCounting) -> Self {
        self.quantizer = self.quantizer.with_counting(counting);
        self
    }

    /// 数据集类型.
    #[inline]
    pub fn variant(&self) -> DatasetVariant {
        self.variant
    }

    /// 后处理方式.
    #[inline]
    pub fn postprocessing(&self) -> PostProcessing {
        self.postprocessing
    }

    /// 最大转角 (度).
    #[inline]
    pub fn max_angle_deg(&self) -> f64 {
        self.max_angle_deg
    }

    /// 相对概率质量门限.
    #[inline]
    pub fn pmf_threshold(&self) -> f64 {
        self.pmf_threshold
    }

    /// FA 停止门限.
    #[inline]
    pub fn fa_threshold(&self) -> f64 {
        self.fa_threshold
    }

    /// 种子密度.
    #[inline]
    pub fn seed_density(&self) -> SeedDensity {
        self.seeds
    }

    /// 追踪参数.
    #[inline]
    pub fn tracker(&self) -> &TrackerParams {
        &self.tracker
    }

    /// 密度量化参数.
    #[inline]
    pub fn quantizer(&self) -> &DensityQuantizer {
        &self.quantizer
    }

    /// 目标 ROI 对.
    #[inline]
    pub fn roi_pair(&self) -> RoiPair {
        self.roi_pair
    }
}
