//! 程序运行函数.

use std::path::Path;

use crate::profile::Profile;
use crate::result::{ProductReport, RunReport};
use tract_berry::dataset::InputFiles;
use tract_berry::pipeline::{DensityProduct, Pipeline};
use tract_berry::{save, MaskVolume, TrackError, TrackResult};
use utils::loader;

/// 将一种产品写到 `output` 下的 `vol_{name}` 目录和 `vol_{name}.npz` 归档.
fn write_product(output: &Path, product: &DensityProduct, like: &MaskVolume) -> TrackResult<ProductReport> {
    let name = format!("vol_{}", product.kind().name());
    let files = save::save_stack(output.join(&name), product.points(), like)?;
    let archive = output.join(format!("{name}.npz"));
    save::save_stack_npz(&archive, product.points())?;
    log::info!("{} masks written for `{}`", files.len(), product.kind());
    Ok(ProductReport {
        kind: product.kind(),
        streamlines: product.streamlines(),
        files,
        archive,
    })
}

/// 实际运行.
pub fn run() -> TrackResult<RunReport> {
    let mut profile = Profile::new();

    let config = loader::config_from_env()?;
    let input = loader::input_dir_from_env_or_home()
        .ok_or_else(|| TrackError::MissingInput("input directory".to_string()))?;
    let output = loader::output_dir_from_env_or_home()
        .ok_or_else(|| TrackError::MissingInput("output directory".to_string()))?;
    log::info!(
        "running {} / {:?} on {} with {} threads",
        config.variant(),
        config.postprocessing(),
        input.display(),
        utils::cpus()
    );

    profile.stage_start();
    let files = InputFiles::discover(
        &input,
        config.postprocessing().needs_rois(),
        config.variant().needs_sphere(),
    )?;
    let inputs = files.load()?;
    inputs.validate()?;
    profile.stage_elapsed("load");

    let pipeline = Pipeline::new(config)?;
    profile.stage_start();
    let seeds = pipeline.seeds(&inputs.seed_mask)?;
    let bundle = pipeline.track(inputs.confidence, inputs.odf, inputs.sphere.as_ref(), &seeds)?;
    profile.stage_elapsed("track");

    profile.stage_start();
    let products = pipeline.postprocess(&bundle, &inputs.seed_mask, inputs.rois.as_ref())?;
    profile.stage_elapsed("postprocess");

    profile.stage_start();
    std::fs::create_dir_all(&output)?;
    let products = products
        .iter()
        .map(|p| write_product(&output, p, &inputs.seed_mask))
        .collect::<TrackResult<Vec<_>>>()?;
    profile.stage_elapsed("save");

    Ok(RunReport {
        seeds: seeds.len(),
        streamlines: bundle.len(),
        points: bundle.total_points(),
        products,
        profile: profile.finish(),
    })
}
