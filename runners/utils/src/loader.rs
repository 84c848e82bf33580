//! 对 `tract-berry::dataset` 的更一层封装. 从环境变量读取运行目录与配置.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tract_berry::config::{DatasetVariant, PostProcessing, TrackingConfig};
use tract_berry::density::VisitCounting;
use tract_berry::streamline::RoiPair;
use tract_berry::tracking::SeedDensity;
use tract_berry::{TrackError, TrackResult};

/// 输入目录.
pub const INPUT_DIR_VAR: &str = "IRONTRACT_INPUT_DIR";

/// 输出目录.
pub const OUTPUT_DIR_VAR: &str = "IRONTRACT_OUTPUT_DIR";

/// 数据集类型, 例如 `HCPL`, `DSI`.
pub const DATASET_VAR: &str = "IRONTRACT_DATASET";

/// 后处理方式, 例如 `EPFL`, `VUMC`, `ALL`.
pub const POSTPROCESSING_VAR: &str = "IRONTRACT_POSTPROCESSING";

/// 全局随机种子.
pub const SEED_VAR: &str = "IRONTRACT_SEED";

/// 每个种子体素的种子个数.
pub const SEEDS_PER_VOXEL_VAR: &str = "IRONTRACT_SEEDS_PER_VOXEL";

/// 目标 ROI 对, 例如 `0,1` 或 `label:3,7`.
pub const ROI_PAIR_VAR: &str = "IRONTRACT_ROI_PAIR";

/// 访问计数方式, `per-pass` 或 `per-point`.
pub const COUNTING_VAR: &str = "IRONTRACT_COUNTING";

/// 获取输入目录.
///
/// 1. 若环境变量 `$IRONTRACT_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/irontract`.
pub fn input_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(INPUT_DIR_VAR) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => tract_berry::dataset::home_dataset_dir_with(["irontract"]),
    }
}

/// 获取输出目录.
///
/// 1. 若环境变量 `$IRONTRACT_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/irontract/output`.
pub fn output_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(OUTPUT_DIR_VAR) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => tract_berry::dataset::home_dataset_dir_with(["irontract", "output"]),
    }
}

/// 从环境变量读取配置. 见 [`config_from`].
#[inline]
pub fn config_from_env() -> TrackResult<TrackingConfig> {
    config_from(|key| env::var(key).ok())
}

/// 解析可选的设置项. 空字符串视为未设置.
fn parse_var<T: FromStr, F: Fn(&str) -> Option<String>>(
    var: &F,
    key: &str,
    err: &'static str,
) -> TrackResult<Option<T>> {
    match var(key) {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TrackError::InvalidConfig(err)),
        _ => Ok(None),
    }
}

/// 以 `var` 查询设置项, 生成配置. 未设置的项使用默认值:
/// 数据集 `HCPL`, 后处理 `EPFL`.
///
/// 数据集或后处理名称未知时分别返回 `Err(TrackError::UnsupportedVariant)` 和
/// `Err(TrackError::UnsupportedPostProcessing)`.
pub fn config_from<F: Fn(&str) -> Option<String>>(var: F) -> TrackResult<TrackingConfig> {
    let variant = match var(DATASET_VAR) {
        Some(s) if !s.trim().is_empty() => s.trim().parse()?,
        _ => DatasetVariant::Hardi,
    };
    let post = match var(POSTPROCESSING_VAR) {
        Some(s) if !s.trim().is_empty() => s.trim().parse()?,
        _ => PostProcessing::LengthOnly,
    };

    let mut config = TrackingConfig::new(variant).with_postprocessing(post);
    if let Some(seed) = parse_var::<u64, _>(&var, SEED_VAR, "IRONTRACT_SEED must be an unsigned integer")? {
        config = config.with_random_seed(seed);
    }
    if let Some(n) = parse_var::<usize, _>(
        &var,
        SEEDS_PER_VOXEL_VAR,
        "IRONTRACT_SEEDS_PER_VOXEL must be an unsigned integer",
    )? {
        config = config.with_seed_density(SeedDensity::PerVoxel(n));
    }
    if let Some(pair) = parse_var::<RoiPair, _>(&var, ROI_PAIR_VAR, "IRONTRACT_ROI_PAIR is malformed")? {
        config = config.with_roi_pair(pair);
    }
    if let Some(c) = parse_var::<VisitCounting, _>(&var, COUNTING_VAR, "IRONTRACT_COUNTING is unknown")? {
        config = config.with_counting(c);
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(lookup(&[])).unwrap();
        assert_eq!(config, TrackingConfig::new(DatasetVariant::Hardi));
        assert_eq!(config.postprocessing(), PostProcessing::LengthOnly);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(lookup(&[
            (DATASET_VAR, "dsi"),
            (POSTPROCESSING_VAR, "ALL"),
            (SEED_VAR, "42"),
            (SEEDS_PER_VOXEL_VAR, " 10 "),
            (ROI_PAIR_VAR, "label:3,7"),
            (COUNTING_VAR, "per-point"),
        ]))
        .unwrap();
        assert_eq!(config.variant(), DatasetVariant::Dsi);
        assert_eq!(config.postprocessing(), PostProcessing::All);
        assert_eq!(config.tracker().random_seed, 42);
        assert_eq!(config.seed_density(), SeedDensity::PerVoxel(10));
        assert_eq!(config.roi_pair(), RoiPair::ByLabel(3, 7));
        assert_eq!(config.quantizer().counting(), VisitCounting::PerPoint);
    }

    #[test]
    fn test_errors() {
        let e = config_from(lookup(&[(DATASET_VAR, "DTI")])).unwrap_err();
        assert!(matches!(e, TrackError::UnsupportedVariant(_)));
        let e = config_from(lookup(&[(POSTPROCESSING_VAR, "MGH")])).unwrap_err();
        assert!(matches!(e, TrackError::UnsupportedPostProcessing(_)));
        let e = config_from(lookup(&[(SEED_VAR, "-1")])).unwrap_err();
        assert!(matches!(e, TrackError::InvalidConfig(_)));
    }
}
