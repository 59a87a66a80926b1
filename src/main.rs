use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use rusty_roads::{
    load_dataset, load_images, render, write_feature_table, write_patch_predictions, PatchMetrics,
    PipelineConfig, SegmentationModel,
};

#[derive(Parser)]
#[command(name = "rusty-roads", about = "Patch-based road segmentation with a polynomial SVM")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit a model on images and their ground-truth masks.
    Train {
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        groundtruth: PathBuf,
        /// Where to write the model snapshot (JSON).
        #[arg(long)]
        model: PathBuf,
        /// Pipeline configuration (JSON). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use only the first N images (sorted by name).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Predict road masks for a directory of images.
    Predict {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        images: PathBuf,
        /// Directory receiving one mask PNG per input image.
        #[arg(long)]
        output: PathBuf,
        /// Also write `<name>_overlay.png` with predicted road tinted.
        #[arg(long)]
        overlay: bool,
        /// Also write per-patch predictions as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Score a saved model against labelled images.
    Evaluate {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        groundtruth: PathBuf,
    },

    /// Export per-patch features and labels (.parquet or .csv).
    Features {
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        groundtruth: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load_from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn train(
    images: &Path,
    groundtruth: &Path,
    model_path: &Path,
    config: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    let config = load_config(config)?;
    let data = load_dataset(images, groundtruth, limit).context("loading training set")?;
    if data.is_empty() {
        bail!("no PNG images found in {}", images.display());
    }

    let mut model = SegmentationModel::new(config)?;
    let summary = model
        .train(&data.masks, &data.images)
        .context("training classifier")?;
    info!(
        "✓ trained on {} patches ({} road, {} support vectors)",
        summary.samples, summary.positives, summary.support_vectors
    );

    let (_, truth) = model.prepare(&data.images, &data.masks)?;
    let (predicted, _) = model.predict_patches(&data.images)?;
    let metrics = PatchMetrics::from_labels(&predicted, &truth)?;
    info!("training set: {metrics}");

    model
        .save(model_path)
        .with_context(|| format!("saving model to {}", model_path.display()))?;
    info!("✓ model written to {}", model_path.display());
    Ok(())
}

fn predict(
    model_path: &Path,
    images: &Path,
    output: &Path,
    overlay: bool,
    csv: Option<&Path>,
) -> Result<()> {
    let model = SegmentationModel::load(model_path)
        .with_context(|| format!("loading model {}", model_path.display()))?;
    let data = load_images(images, None).context("loading images")?;

    let (labels, grid) = model.predict_patches(&data.images)?;
    let masks = rusty_roads::reconstruct(
        &labels,
        data.len(),
        grid.image_shape(),
        model.config().patch_size,
    )?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("creating {}", output.display()))?;
    for ((name, image), mask) in data.names.iter().zip(&data.images).zip(&masks) {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let mask_path = output.join(format!("{stem}_mask.png"));
        render::mask_to_luma(mask)
            .save(&mask_path)
            .with_context(|| format!("writing {}", mask_path.display()))?;
        if overlay {
            let overlay_path = output.join(format!("{stem}_overlay.png"));
            render::overlay(image, mask, 0.0, 0.45)
                .save(&overlay_path)
                .with_context(|| format!("writing {}", overlay_path.display()))?;
        }
    }
    info!("✓ wrote {} masks to {}", masks.len(), output.display());

    if let Some(csv_path) = csv {
        write_patch_predictions(csv_path, &data.names, &grid, &labels)
            .with_context(|| format!("writing {}", csv_path.display()))?;
        info!("✓ patch predictions written to {}", csv_path.display());
    }
    Ok(())
}

fn evaluate(model_path: &Path, images: &Path, groundtruth: &Path) -> Result<()> {
    let model = SegmentationModel::load(model_path)
        .with_context(|| format!("loading model {}", model_path.display()))?;
    let data = load_dataset(images, groundtruth, None).context("loading evaluation set")?;
    let (_, truth) = model.prepare(&data.images, &data.masks)?;
    let (predicted, _) = model.predict_patches(&data.images)?;
    let metrics = PatchMetrics::from_labels(&predicted, &truth)?;
    println!("{metrics}");
    Ok(())
}

fn features(
    images: &Path,
    groundtruth: &Path,
    output: &Path,
    config: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    let config = load_config(config)?;
    let data = load_dataset(images, groundtruth, limit).context("loading dataset")?;
    let model = SegmentationModel::new(config)?;
    let table = model.prepare_table(&data.images, &data.masks)?;

    let batch = table.to_record_batch()?;
    let preview = arrow::util::pretty::pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))])?;
    println!("{preview}");

    write_feature_table(output, &table)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("✓ {} patch rows written to {}", table.len(), output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train {
            images,
            groundtruth,
            model,
            config,
            limit,
        } => train(&images, &groundtruth, &model, config.as_deref(), limit),
        Command::Predict {
            model,
            images,
            output,
            overlay,
            csv,
        } => predict(&model, &images, &output, overlay, csv.as_deref()),
        Command::Evaluate {
            model,
            images,
            groundtruth,
        } => evaluate(&model, &images, &groundtruth),
        Command::Features {
            images,
            groundtruth,
            output,
            config,
            limit,
        } => features(&images, &groundtruth, &output, config.as_deref(), limit),
    }
}
