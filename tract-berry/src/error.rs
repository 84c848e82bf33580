//! 运行时错误.

use std::fmt::{self, Display, Formatter};

/// 追踪流水线的运行时错误.
#[derive(Debug)]
pub enum TrackError {
    /// 不支持的方向场 (数据集) 类型. 参数为原始字符串.
    UnsupportedVariant(String),

    /// 不支持的后处理模式. 参数为原始字符串.
    UnsupportedPostProcessing(String),

    /// 两份体数据的网格 (形状或仿射矩阵) 不一致. 参数说明是哪两份数据.
    GridMismatch(&'static str, &'static str),

    /// 数据形状与其声明的网格不符.
    ///
    /// 第一个参数为期望形状, 第二个参数为实际形状.
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// 球谐系数个数不对应任何偶数阶数.
    InvalidShCoefficients(usize),

    /// 离散 PMF 的长度与球面顶点数不一致.
    ///
    /// 第一个参数为球面顶点数, 第二个参数为 PMF 长度.
    PmfSphereMismatch(usize, usize),

    /// 球面没有任何合法顶点.
    EmptySphere,

    /// 仿射矩阵不可逆.
    SingularAffine,

    /// 非法配置项. 参数为说明.
    InvalidConfig(&'static str),

    /// 缺少必要的输入 (文件, 目录或 ROI). 参数为说明.
    MissingInput(String),

    /// 读写 nifti 文件错误.
    Nifti(nifti::NiftiError),

    /// 写 npz 归档错误.
    Npz(ndarray_npy::WriteNpzError),

    /// 读 npy 文件错误.
    Npy(ndarray_npy::ReadNpyError),

    /// ndarray 形状转换错误.
    Shape(ndarray::ShapeError),

    /// 其他底层 I/O 错误.
    Io(std::io::Error),
}

/// 追踪流水线的运行结果.
pub type TrackResult<T> = Result<T, TrackError>;

impl Display for TrackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVariant(s) => write!(f, "unsupported direction-field variant `{s}`"),
            Self::UnsupportedPostProcessing(s) => write!(f, "unsupported post-processing `{s}`"),
            Self::GridMismatch(a, b) => write!(f, "voxel grid of `{a}` does not match `{b}`"),
            Self::ShapeMismatch(want, got) => {
                write!(f, "expected data shape {want:?}, found {got:?}")
            }
            Self::InvalidShCoefficients(n) => {
                write!(f, "{n} coefficients do not form an even-order SH series")
            }
            Self::PmfSphereMismatch(sphere, pmf) => {
                write!(f, "sphere has {sphere} vertices but pmf has {pmf} values")
            }
            Self::EmptySphere => f.write_str("sphere has no usable vertex"),
            Self::SingularAffine => f.write_str("affine is not invertible"),
            Self::InvalidConfig(s) => write!(f, "invalid configuration: {s}"),
            Self::MissingInput(s) => write!(f, "missing input: {s}"),
            Self::Nifti(e) => write!(f, "nifti: {e}"),
            Self::Npz(e) => write!(f, "npz: {e}"),
            Self::Npy(e) => write!(f, "npy: {e}"),
            Self::Shape(e) => write!(f, "shape: {e}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for TrackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Nifti(e) => Some(e),
            Self::Npz(e) => Some(e),
            Self::Npy(e) => Some(e),
            Self::Shape(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($src: ty => $variant: ident),+) => {
        $(
            impl From<$src> for TrackError {
                #[inline]
                fn from(e: $src) -> Self {
                    Self::$variant(e)
                }
            }
        )+
    };
}

impl_from!(
    nifti::NiftiError => Nifti,
    ndarray_npy::WriteNpzError => Npz,
    ndarray_npy::ReadNpyError => Npy,
    ndarray::ShapeError => Shape,
    std::io::Error => Io
);
