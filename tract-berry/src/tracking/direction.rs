//! 概率方向场.
//!
//! 每个体素上有一个定义在离散球面顶点上的概率质量函数 (PMF). 它可以来自球谐系数
//! (在球面上求值), 也可以是直接给出的离散 PMF. 两种来源构造出同一个
//! [`DirectionField`] 类型, 追踪器只通过 [`DirectionGetter`] 使用它.
//!
//! 采样流程:
//!
//! 1. 在连续体素坐标处三线性插值 (系数或 PMF), 负值置 0;
//! 2. 低于 `pmf_threshold * max` 的质量置 0;
//! 3. 与上一步方向夹角超过 `max_angle` 的顶点置 0 (对踵点视为同一方向);
//! 4. 在剩余质量上按逆 CDF 抽样, 结果翻转到与上一步方向同侧.
//!
//! 剩余质量为 0 或位置在网格外时终止.

use std::cmp::Reverse;

use glam::DVec3;
use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::DatasetVariant;
use crate::consts::tracking::{MIN_SEPARATION_ANGLE_DEG, RELATIVE_PEAK_THRESHOLD};
use crate::interp::trilinear_lane;
use crate::shm::{order_from_coefficients, ShBasis};
use crate::sphere::Sphere;
use crate::{OdfVolume, TrackError, TrackResult, VolumeAttr, VoxelGrid};

/// 单个种子追踪时的可变上下文: 随机数发生器与复用的缓冲区.
///
/// 每个种子拥有独立的上下文, 因此并行追踪时不需要同步.
#[derive(Debug, Clone)]
pub struct WalkContext {
    rng: ChaCha8Rng,
    sh: Vec<f64>,
    pmf: Vec<f64>,
}

impl WalkContext {
    /// 以给定随机数发生器创建.
    #[inline]
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            sh: Vec::new(),
            pmf: Vec::new(),
        }
    }

    /// 第 `index` 个种子的上下文: 由全局随机种子 `seed` 派生出第 `index` 条独立随机流.
    ///
    /// 同一 `(seed, index)` 总是得到相同的随机序列, 与追踪的先后顺序无关.
    pub fn for_seed(seed: u64, index: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(index);
        Self::new(rng)
    }

    /// 随机数发生器.
    #[inline]
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

/// 追踪器使用的方向场接口.
///
/// 所有位置都是连续体素坐标; 方向是单位向量. 追踪器在多个线程间共享同一个方向场,
/// 因此要求 `Sync`.
pub trait DirectionGetter: Sync {
    /// 方向场所在的体素网格.
    fn grid(&self) -> &VoxelGrid;

    /// 种子点 `p` 处的初始方向, 按质量降序, 至多 `limit` 个.
    fn initial_directions(&self, p: DVec3, limit: usize, ctx: &mut WalkContext) -> Vec<DVec3>;

    /// 以上一步方向 `prev` 在 `p` 处抽样下一步方向. 返回 `None` 表示终止.
    fn next_direction(&self, p: DVec3, prev: DVec3, ctx: &mut WalkContext) -> Option<DVec3>;
}

/// PMF 的来源.
#[derive(Debug, Clone)]
pub enum PmfSource {
    /// 球谐系数场, 以及在球面上求值用的基矩阵.
    ShCoefficients {
        /// 每个体素的球谐系数.
        coeffs: OdfVolume,
        /// 球谐基.
        basis: ShBasis,
    },

    /// 每个体素直接给出球面各顶点上的 PMF.
    Discrete(OdfVolume),
}

impl PmfSource {
    #[inline]
    fn volume(&self) -> &OdfVolume {
        match self {
            Self::ShCoefficients { coeffs, .. } => coeffs,
            Self::Discrete(v) => v,
        }
    }
}

/// 概率方向场.
#[derive(Debug, Clone)]
pub struct DirectionField {
    source: PmfSource,
    sphere: Sphere,
    pmf_threshold: f64,
    cos_max_angle: f64,
    /// 每个顶点在 `MIN_SEPARATION_ANGLE_DEG` 内的邻居 (对踵点视为同一方向), 用于找局部峰值.
    neighbours: Vec<Vec<usize>>,
}

/// 找出每个顶点夹角小于 `angle_deg` 的其他顶点.
fn neighbours_within(sphere: &Sphere, angle_deg: f64) -> Vec<Vec<usize>> {
    let cos = angle_deg.to_radians().cos();
    let vertices = sphere.vertices();
    vertices
        .iter()
        .enumerate()
        .map(|(i, v)| {
            vertices
                .iter()
                .enumerate()
                .filter(|&(j, u)| j != i && v.dot(*u).abs() > cos)
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

impl DirectionField {
    /// 由球谐系数场创建. 系数个数必须对应某个偶数阶.
    pub fn from_shcoeff(
        coeffs: OdfVolume,
        sphere: Sphere,
        max_angle_deg: f64,
        pmf_threshold: f64,
    ) -> TrackResult<Self> {
        let n = coeffs.len_values();
        let order = order_from_coefficients(n).ok_or(TrackError::InvalidShCoefficients(n))?;
        let basis = ShBasis::new(order, &sphere);
        Self::with_source(
            PmfSource::ShCoefficients { coeffs, basis },
            sphere,
            max_angle_deg,
            pmf_threshold,
        )
    }

    /// 由离散 PMF 场创建. PMF 长度必须等于球面顶点数.
    pub fn from_pmf(
        pmf: OdfVolume,
        sphere: Sphere,
        max_angle_deg: f64,
        pmf_threshold: f64,
    ) -> TrackResult<Self> {
        if pmf.len_values() != sphere.len() {
            return Err(TrackError::PmfSphereMismatch(sphere.len(), pmf.len_values()));
        }
        Self::with_source(PmfSource::Discrete(pmf), sphere, max_angle_deg, pmf_threshold)
    }

    /// 按数据集类型选择构造方式: HARDI 数据为球谐系数, DSI 数据为离散 PMF.
    pub fn from_variant(
        variant: DatasetVariant,
        odf: OdfVolume,
        sphere: Sphere,
        max_angle_deg: f64,
        pmf_threshold: f64,
    ) -> TrackResult<Self> {
        match variant {
            DatasetVariant::Hardi => Self::from_shcoeff(odf, sphere, max_angle_deg, pmf_threshold),
            DatasetVariant::Dsi => Self::from_pmf(odf, sphere, max_angle_deg, pmf_threshold),
        }
    }

    fn with_source(
        source: PmfSource,
        sphere: Sphere,
        max_angle_deg: f64,
        pmf_threshold: f64,
    ) -> TrackResult<Self> {
        if !(max_angle_deg > 0.0 && max_angle_deg <= 90.0) {
            return Err(TrackError::InvalidConfig("max angle must be in (0, 90] degrees"));
        }
        if !(0.0..=1.0).contains(&pmf_threshold) {
            return Err(TrackError::InvalidConfig("pmf threshold must be in [0, 1]"));
        }
        let neighbours = neighbours_within(&sphere, MIN_SEPARATION_ANGLE_DEG);
        Ok(Self {
            source,
            sphere,
            pmf_threshold,
            cos_max_angle: max_angle_deg.to_radians().cos(),
            neighbours,
        })
    }

    /// PMF 来源.
    #[inline]
    pub fn source(&self) -> &PmfSource {
        &self.source
    }

    /// 离散球面.
    #[inline]
    pub fn sphere(&self) -> &Sphere {
        &self.sphere
    }

    /// 在 `p` 处求 (已去负值, 已施加相对门限的) PMF, 结果放在 `ctx.pmf`.
    ///
    /// 位置在网格外时返回 `false`.
    fn pmf_at(&self, p: DVec3, ctx: &mut WalkContext) -> bool {
        let WalkContext { sh, pmf, .. } = ctx;
        pmf.resize(self.sphere.len(), 0.0);
        let inside = match &self.source {
            PmfSource::ShCoefficients { coeffs, basis } => {
                sh.resize(coeffs.len_values(), 0.0);
                let inside = trilinear_lane(&coeffs.data(), p, sh);
                if inside {
                    basis.evaluate(sh, pmf);
                }
                inside
            }
            PmfSource::Discrete(v) => trilinear_lane(&v.data(), p, pmf),
        };
        if !inside {
            return false;
        }

        let mut max = 0.0f64;
        for v in pmf.iter_mut() {
            // NaN 同样置 0.
            if !(*v > 0.0) {
                *v = 0.0;
            }
            max = max.max(*v);
        }
        let cut = self.pmf_threshold * max;
        for v in pmf.iter_mut().filter(|v| **v < cut) {
            *v = 0.0;
        }
        true
    }
}

impl DirectionGetter for DirectionField {
    #[inline]
    fn grid(&self) -> &VoxelGrid {
        self.source.volume().grid()
    }

    fn initial_directions(&self, p: DVec3, limit: usize, ctx: &mut WalkContext) -> Vec<DVec3> {
        if limit == 0 || !self.pmf_at(p, ctx) {
            return Vec::new();
        }
        let pmf = &ctx.pmf;
        let max = pmf.iter().copied().fold(0.0f64, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }

        // 候选方向: 足够强的局部峰值.
        let cut = RELATIVE_PEAK_THRESHOLD * max;
        let mut candidates: Vec<usize> = (0..pmf.len())
            .filter(|&i| pmf[i] >= cut && self.neighbours[i].iter().all(|&j| pmf[j] <= pmf[i]))
            .collect();
        candidates.sort_by_key(|&i| Reverse(OrderedFloat(pmf[i])));

        let cos_sep = MIN_SEPARATION_ANGLE_DEG.to_radians().cos();
        let vertices = self.sphere.vertices();
        let mut picked: Vec<DVec3> = Vec::with_capacity(limit);
        for i in candidates {
            let v = vertices[i];
            if picked.iter().all(|d| d.dot(v).abs() <= cos_sep) {
                picked.push(v);
                if picked.len() == limit {
                    break;
                }
            }
        }
        picked
    }

    fn next_direction(&self, p: DVec3, prev: DVec3, ctx: &mut WalkContext) -> Option<DVec3> {
        let prev = prev.try_normalize()?;
        if !self.pmf_at(p, ctx) {
            return None;
        }

        // 就地把 PMF 变为 CDF.
        let vertices = self.sphere.vertices();
        let mut total = 0.0;
        for (v, mass) in vertices.iter().zip(ctx.pmf.iter_mut()) {
            if v.dot(prev).abs() < self.cos_max_angle {
                *mass = 0.0;
            }
            total += *mass;
            *mass = total;
        }
        if total <= 0.0 {
            return None;
        }

        let u = ctx.rng.random::<f64>() * total;
        let index = ctx.pmf.partition_point(|&c| c <= u).min(vertices.len() - 1);
        let d = vertices[index];
        Some(if d.dot(prev) < 0.0 { -d } else { d })
    }
}
