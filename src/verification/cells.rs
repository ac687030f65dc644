//! Independent verification cells.
//!
//! Every cell reseeds the generator, builds its own random inputs, runs the
//! formula and the built-in, and compares them. Nothing is shared between cells.

use tch::Tensor;

use super::{compare, CheckOutcome};
use crate::config::CheckConfig;
use crate::normalization::{self, Affine, RunningStats};
use crate::reference;
use crate::Result;

pub type Cell = fn(&CheckConfig) -> Result<Vec<CheckOutcome>>;

pub const CELLS: &[(&str, Cell)] = &[
    ("batch_norm", batch_norm_cell),
    ("running_stats", running_stats_cell),
    ("layer_norm", layer_norm_cell),
    ("instance_norm", instance_norm_cell),
    ("group_norm", group_norm_cell),
    ("weight_norm", weight_norm_cell),
];

/// Validates `config` and reseeds the generator; every cell starts here.
fn seeded(config: &CheckConfig) -> Result<()> {
    config.validate()?;
    tch::manual_seed(config.seed);
    Ok(())
}

fn image_input(config: &CheckConfig) -> Result<(Tensor, Affine)> {
    seeded(config)?;
    let options = config.options();
    let x = Tensor::randn(config.image_shape.as_slice(), options);
    let affine = Affine::random(&[config.image_shape[1]], options);
    Ok((x, affine))
}

pub fn batch_norm_cell(config: &CheckConfig) -> Result<Vec<CheckOutcome>> {
    let (x, affine) = image_input(config)?;
    let eps = config.eps;

    Ok(vec![
        compare(
            "batch_norm",
            &normalization::batch_norm(&x, None, eps)?,
            &reference::batch_norm(&x, None, eps)?,
            config.tolerance,
        )?,
        compare(
            "batch_norm_affine",
            &normalization::batch_norm(&x, Some(&affine), eps)?,
            &reference::batch_norm(&x, Some(&affine), eps)?,
            config.tolerance,
        )?,
    ])
}

/// Two training batches, then inference with the accumulated buffers.
pub fn running_stats_cell(config: &CheckConfig) -> Result<Vec<CheckOutcome>> {
    let (first, affine) = image_input(config)?;
    let second = Tensor::randn(config.image_shape.as_slice(), config.options()) * 2.0 + 0.5;
    let channels = config.image_shape[1];
    let eps = config.eps;

    let mut ours = RunningStats::new(channels, config.momentum, config.options());
    let mut theirs = RunningStats::new(channels, config.momentum, config.options());
    for batch in [&first, &second] {
        ours.update(batch)?;
        reference::batch_norm_train(batch, &mut theirs, Some(&affine), eps)?;
    }

    Ok(vec![
        compare("running_mean", &ours.mean, &theirs.mean, config.tolerance)?,
        compare("running_var", &ours.var, &theirs.var, config.tolerance)?,
        compare(
            "batch_norm_eval",
            &normalization::batch_norm_eval(&first, &ours, Some(&affine), eps)?,
            &reference::batch_norm_eval(&first, &theirs, Some(&affine), eps)?,
            config.tolerance,
        )?,
    ])
}

pub fn layer_norm_cell(config: &CheckConfig) -> Result<Vec<CheckOutcome>> {
    seeded(config)?;
    let options = config.options();
    let shape = &config.sequence_shape;
    let normalized = &shape[shape.len() - config.layer_normalized_dims..];

    let x = Tensor::randn(shape.as_slice(), options);
    let affine = Affine::random(normalized, options);
    let eps = config.eps;

    Ok(vec![
        compare(
            "layer_norm",
            &normalization::layer_norm(&x, normalized, None, eps)?,
            &reference::layer_norm(&x, normalized, None, eps)?,
            config.tolerance,
        )?,
        compare(
            "layer_norm_affine",
            &normalization::layer_norm(&x, normalized, Some(&affine), eps)?,
            &reference::layer_norm(&x, normalized, Some(&affine), eps)?,
            config.tolerance,
        )?,
    ])
}

pub fn instance_norm_cell(config: &CheckConfig) -> Result<Vec<CheckOutcome>> {
    let (x, affine) = image_input(config)?;
    let eps = config.eps;

    Ok(vec![compare(
        "instance_norm_affine",
        &normalization::instance_norm(&x, Some(&affine), eps)?,
        &reference::instance_norm(&x, Some(&affine), eps)?,
        config.tolerance,
    )?])
}

pub fn group_norm_cell(config: &CheckConfig) -> Result<Vec<CheckOutcome>> {
    let (x, affine) = image_input(config)?;
    let eps = config.eps;
    let groups = config.num_groups;

    Ok(vec![compare(
        "group_norm_affine",
        &normalization::group_norm(&x, groups, Some(&affine), eps)?,
        &reference::group_norm(&x, groups, Some(&affine), eps)?,
        config.tolerance,
    )?])
}

pub fn weight_norm_cell(config: &CheckConfig) -> Result<Vec<CheckOutcome>> {
    seeded(config)?;
    let options = config.options();
    let (out_features, in_features) = (config.weight_shape[0], config.weight_shape[1]);

    let w = Tensor::randn([out_features, in_features], options);
    let b = Tensor::randn([out_features], options);
    let x = Tensor::randn([3, in_features], options);
    // positive magnitudes unrelated to the row norms of w
    let g = Tensor::rand([out_features, 1], options) + 0.5;
    let parts = normalization::decompose_weight(&w, 0)?;

    Ok(vec![
        compare("weight_recompose", &parts.recompose(), &w, config.tolerance)?,
        compare(
            "weight_direction_norm",
            &parts.direction_norms()?,
            &Tensor::ones_like(&parts.magnitude),
            config.tolerance,
        )?,
        compare(
            "weight_norm_builtin",
            &normalization::weight_norm(&parts.direction, &parts.magnitude, 0)?,
            &reference::weight_norm(&parts.direction, &parts.magnitude, 0)?,
            config.tolerance,
        )?,
        compare(
            "weight_norm_reparam",
            &normalization::weight_norm(&w, &g, 0)?,
            &reference::weight_norm(&w, &g, 0)?,
            config.tolerance,
        )?,
        compare(
            "weight_norm_linear",
            &parts.linear(&x, Some(&b))?,
            &x.f_linear(&w, Some(&b))?,
            config.tolerance,
        )?,
    ])
}
