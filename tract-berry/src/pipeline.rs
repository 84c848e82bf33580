//! 流水线: 检查输入, 追踪, 后处理, 生成工作点.
//!
//! ```text
//! 方向场 + 停止准则 + 种子 -> 追踪器 -> 纤维集合
//!     -> (可选) ROI 连通性过滤 -> 密度量化 -> 工作点序列
//! ```

use crate::config::{DatasetVariant, ProductKind, TrackingConfig};
use crate::density::OperatingPoints;
use crate::sphere::Sphere;
use crate::streamline::{filter_by_pair, Bundle};
use crate::tracking::{
    DirectionField, DirectionGetter, LocalTracker, SeedSet, StoppingCriterion, ThresholdStoppingCriterion,
};
use crate::{LabelVolume, MaskVolume, OdfVolume, ScalarVolume, TrackError, TrackResult, VolumeAttr};

/// 一次运行的全部输入体数据. 它们必须共享同一个体素网格.
#[derive(Debug, Clone)]
pub struct TrackingInputs {
    /// 置信度标量场 (FA), 用于停止准则.
    pub confidence: ScalarVolume,

    /// 方向分布场 (球谐系数或离散 PMF).
    pub odf: OdfVolume,

    /// 种子掩膜. 输出的工作点也位于该网格上.
    pub seed_mask: MaskVolume,

    /// ROI 标签. 只有 ROI 连通性后处理需要.
    pub rois: Option<LabelVolume>,

    /// 拟合离散 PMF 时使用的球面顶点表. DSI 数据必须提供.
    pub sphere: Option<Sphere>,
}

impl TrackingInputs {
    /// 检查所有体数据共享同一个网格. 不一致时返回 `Err(TrackError::GridMismatch)`.
    pub fn validate(&self) -> TrackResult<()> {
        let reference = self.confidence.grid();
        if !self.odf.grid().matches(reference) {
            return Err(TrackError::GridMismatch("direction field", "confidence"));
        }
        if !self.seed_mask.grid().matches(reference) {
            return Err(TrackError::GridMismatch("seed mask", "confidence"));
        }
        if let Some(rois) = &self.rois {
            if !rois.grid().matches(reference) {
                return Err(TrackError::GridMismatch("rois", "confidence"));
            }
        }
        Ok(())
    }
}

/// 一种密度产品: 参与计数的纤维条数, 以及工作点序列.
#[derive(Debug, Clone)]
pub struct DensityProduct {
    kind: ProductKind,
    streamlines: usize,
    points: OperatingPoints,
}

impl DensityProduct {
    /// 产品类型.
    #[inline]
    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    /// 过滤后参与计数的纤维条数 (长度过滤之前).
    #[inline]
    pub fn streamlines(&self) -> usize {
        self.streamlines
    }

    /// 工作点序列. 克隆开销很小, 可以多次迭代.
    #[inline]
    pub fn points(&self) -> OperatingPoints {
        self.points.clone()
    }
}

/// 一次完整运行的结果.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// 种子个数.
    pub seeds: usize,

    /// 追踪得到的全部纤维 (未过滤).
    pub bundle: Bundle,

    /// 按生成顺序排列的密度产品.
    pub products: Vec<DensityProduct>,
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 并行追踪所有种子.
        #[inline]
        fn track_seeds<D, S>(tracker: &LocalTracker<'_, D, S>, seeds: &SeedSet) -> Bundle
        where
            D: DirectionGetter + ?Sized,
            S: StoppingCriterion + ?Sized,
        {
            tracker.par_track(seeds)
        }
    } else {
        /// 逐个追踪所有种子.
        #[inline]
        fn track_seeds<D, S>(tracker: &LocalTracker<'_, D, S>, seeds: &SeedSet) -> Bundle
        where
            D: DirectionGetter + ?Sized,
            S: StoppingCriterion + ?Sized,
        {
            tracker.track(seeds)
        }
    }
}

/// 流水线.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: TrackingConfig,
    sphere: Option<Sphere>,
}

impl Pipeline {
    /// 以配置 `config` 创建流水线. 配置非法时返回 `Err`.
    pub fn new(config: TrackingConfig) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self { config, sphere: None })
    }

    /// 指定方向场使用的球面. 输入中附带的顶点表优先于它.
    #[inline]
    pub fn with_sphere(mut self, sphere: Sphere) -> Self {
        self.sphere = Some(sphere);
        self
    }

    /// 选出方向场使用的球面: 依次为 `given`, [`Pipeline::with_sphere`] 指定的球面,
    /// 球谐数据的默认球面.
    ///
    /// 离散 PMF 数据没有顶点表时返回 `Err(TrackError::MissingInput)`:
    /// PMF 只能解释在拟合时所用的顶点表上.
    pub fn field_sphere(&self, given: Option<&Sphere>) -> TrackResult<Sphere> {
        match (given.or(self.sphere.as_ref()), self.config.variant()) {
            (Some(sphere), _) => Ok(sphere.clone()),
            (None, DatasetVariant::Hardi) => Ok(Sphere::default_symmetric().clone()),
            (None, DatasetVariant::Dsi) => Err(TrackError::MissingInput("pmf sphere".to_string())),
        }
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// 从种子掩膜生成种子.
    pub fn seeds(&self, seed_mask: &MaskVolume) -> TrackResult<SeedSet> {
        let seeds = SeedSet::from_mask(
            seed_mask,
            self.config.seed_density(),
            self.config.tracker().random_seed,
        )?;
        log::info!(
            "{} seeds from {} mask voxels ({:?})",
            seeds.len(),
            seed_mask.count(),
            self.config.seed_density()
        );
        Ok(seeds)
    }

    /// 以置信度场 `confidence` 和方向分布场 `odf` 追踪所有种子.
    /// `sphere` 为方向场附带的顶点表, 见 [`Pipeline::field_sphere`].
    pub fn track(
        &self,
        confidence: ScalarVolume,
        odf: OdfVolume,
        sphere: Option<&Sphere>,
        seeds: &SeedSet,
    ) -> TrackResult<Bundle> {
        let c = &self.config;
        let field = DirectionField::from_variant(
            c.variant(),
            odf,
            self.field_sphere(sphere)?,
            c.max_angle_deg(),
            c.pmf_threshold(),
        )?;
        let criterion = ThresholdStoppingCriterion::new(confidence, c.fa_threshold());
        let tracker = LocalTracker::new(&field, &criterion, *c.tracker())?;
        let bundle = track_seeds(&tracker, seeds);

        log::info!(
            "{} streamlines ({} points) tracked on {} data",
            bundle.len(),
            bundle.total_points(),
            c.variant()
        );
        Ok(bundle)
    }

    /// 按配置的后处理方式, 由 `bundle` 生成密度产品. 工作点位于 `seed_mask` 的网格上.
    ///
    /// 需要 ROI 而 `rois` 为 `None` 时返回 `Err(TrackError::MissingInput)`.
    pub fn postprocess(
        &self,
        bundle: &Bundle,
        seed_mask: &MaskVolume,
        rois: Option<&LabelVolume>,
    ) -> TrackResult<Vec<DensityProduct>> {
        let quantizer = self.config.quantizer();
        let grid = seed_mask.grid();
        let mut products = Vec::new();
        for &kind in self.config.postprocessing().products() {
            let filtered = match kind {
                ProductKind::LengthFiltered => bundle.longer_than(quantizer.min_length()),
                ProductKind::RoiFiltered => {
                    let rois = rois.ok_or_else(|| TrackError::MissingInput("rois".to_string()))?;
                    let long = bundle.longer_than(quantizer.min_length());
                    filter_by_pair(&long, rois, self.config.roi_pair())
                }
            };
            let points = quantizer.quantize(&filtered, grid);
            log::info!(
                "product `{kind}`: {} streamlines, {} operating points",
                filtered.len(),
                points.len()
            );
            products.push(DensityProduct {
                kind,
                streamlines: filtered.len(),
                points,
            });
        }
        Ok(products)
    }

    /// 完整运行: 检查输入, 生成种子, 追踪, 后处理.
    pub fn run(&self, inputs: TrackingInputs) -> TrackResult<PipelineOutput> {
        inputs.validate()?;
        if self.config.postprocessing().needs_rois() && inputs.rois.is_none() {
            return Err(TrackError::MissingInput("rois".to_string()));
        }
        let TrackingInputs {
            confidence,
            odf,
            seed_mask,
            rois,
            sphere,
        } = inputs;
        let sphere = self.field_sphere(sphere.as_ref())?;

        let seeds = self.seeds(&seed_mask)?;
        let bundle = self.track(confidence, odf, Some(&sphere), &seeds)?;
        let products = self.postprocess(&bundle, &seed_mask, rois.as_ref())?;
        Ok(PipelineOutput {
            seeds: seeds.len(),
            bundle,
            products,
        })
    }
}
