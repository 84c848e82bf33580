//! 数据集目录操作: 按文件名后缀发现输入文件, 并加载为 [`TrackingInputs`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::TrackingInputs;
use crate::sphere::Sphere;
use crate::{LabelVolume, MaskVolume, OdfVolume, ScalarVolume, TrackError, TrackResult};

/// 置信度 (FA) 图的文件名后缀.
pub const FA_SUFFIX: &str = "fa";

/// 方向分布场的文件名后缀.
pub const ODF_SUFFIX: &str = "odf";

/// 种子 (注射区) 掩膜的文件名后缀.
pub const INJECT_SUFFIX: &str = "inject";

/// ROI 标签的文件名后缀.
pub const ROIS_SUFFIX: &str = "rois";

/// 离散 PMF 顶点表的文件名后缀.
pub const SPHERE_SUFFIX: &str = "sphere";

/// 可识别的 NIfTI 扩展名.
const NIFTI_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// 顶点表的扩展名.
const NPY_EXTENSIONS: [&str; 1] = [".npy"];

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 文件名 (忽略大小写) 是否以 `suffix` 加 `extensions` 中某个扩展名结尾?
fn has_suffix(name: &str, suffix: &str, extensions: &[&str]) -> bool {
    let name = name.to_ascii_lowercase();
    let suffix = suffix.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| name.strip_suffix(ext).is_some_and(|stem| stem.ends_with(&suffix)))
}

/// 在目录 `dir` 下寻找文件名以 `suffix` 加 NIfTI 扩展名结尾的文件.
///
/// 有多个匹配时按文件名排序取第一个. 没有匹配时返回 `Err(TrackError::MissingInput)`.
#[inline]
pub fn find_input<P: AsRef<Path>>(dir: P, suffix: &str) -> TrackResult<PathBuf> {
    find_file(dir.as_ref(), suffix, &NIFTI_EXTENSIONS)
}

/// 在目录 `dir` 下寻找 `*sphere.npy` 顶点表. 规则同 [`find_input`].
#[inline]
pub fn find_sphere<P: AsRef<Path>>(dir: P) -> TrackResult<PathBuf> {
    find_file(dir.as_ref(), SPHERE_SUFFIX, &NPY_EXTENSIONS)
}

fn find_file(dir: &Path, suffix: &str, extensions: &[&str]) -> TrackResult<PathBuf> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if has_suffix(name, suffix, extensions) {
                found.push(entry.path());
            }
        }
    }
    found.sort();
    if found.len() > 1 {
        log::warn!("{} files match `{suffix}`, using {:?}", found.len(), found[0]);
    }
    found
        .into_iter()
        .next()
        .ok_or_else(|| TrackError::MissingInput(format!("{suffix} in {}", dir.display())))
}

/// 一个受试者目录下的输入文件.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFiles {
    /// 置信度 (FA) 图.
    pub fa: PathBuf,

    /// 方向分布场.
    pub odf: PathBuf,

    /// 种子掩膜.
    pub inject: PathBuf,

    /// ROI 标签, 不需要时可以没有.
    pub rois: Option<PathBuf>,

    /// 离散 PMF 的顶点表, 不需要时可以没有.
    pub sphere: Option<PathBuf>,
}

/// `need == true` 时缺失是错误, 否则找不到就是 `None`.
fn optional(found: TrackResult<PathBuf>, need: bool) -> TrackResult<Option<PathBuf>> {
    match found {
        Ok(p) => Ok(Some(p)),
        Err(TrackError::MissingInput(_)) if !need => Ok(None),
        Err(e) => Err(e),
    }
}

impl InputFiles {
    /// 在目录 `dir` 下发现输入文件. `need_rois`/`need_sphere` 为 `true` 时
    /// ROI 文件/顶点表缺失是错误, 否则存在就使用.
    pub fn discover<P: AsRef<Path>>(dir: P, need_rois: bool, need_sphere: bool) -> TrackResult<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            fa: find_input(dir, FA_SUFFIX)?,
            odf: find_input(dir, ODF_SUFFIX)?,
            inject: find_input(dir, INJECT_SUFFIX)?,
            rois: optional(find_input(dir, ROIS_SUFFIX), need_rois)?,
            sphere: optional(find_sphere(dir), need_sphere)?,
        })
    }

    /// 读取全部文件. 不检查网格是否一致, 由流水线负责.
    pub fn load(&self) -> TrackResult<TrackingInputs> {
        log::debug!("loading inputs {self:?}");
        Ok(TrackingInputs {
            confidence: ScalarVolume::open(&self.fa)?,
            odf: OdfVolume::open(&self.odf)?,
            seed_mask: MaskVolume::open(&self.inject)?,
            rois: self.rois.as_ref().map(LabelVolume::open).transpose()?,
            sphere: self.sphere.as_ref().map(Sphere::open).transpose()?,
        })
    }
}
