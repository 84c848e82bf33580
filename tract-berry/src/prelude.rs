//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{
    LabelVolume, MaskVolume, OdfVolume, ScalarVolume, Volume, VolumeAttr, VoxelGrid,
};
pub use crate::error::{TrackError, TrackResult};

pub use crate::config::{DatasetVariant, PostProcessing, ProductKind, TrackingConfig};
pub use crate::density::{DensityQuantizer, OperatingPoint, OperatingPoints, VisitCounting};
pub use crate::pipeline::{DensityProduct, Pipeline, PipelineOutput, TrackingInputs};
pub use crate::sphere::Sphere;
pub use crate::streamline::{Bundle, RoiPair, Streamline};
pub use crate::tracking::{SeedDensity, SeedSet, TrackerParams};

pub use crate::dataset::{self, home_dataset_dir_with, InputFiles};
pub use crate::save;
