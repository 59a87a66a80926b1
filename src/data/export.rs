use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{concatenate, Array2, Axis};
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::model::Label;
use super::patch::PatchGrid;
use crate::error::{Result, SegmentationError};

// ---------------------------------------------------------------------------
// FeatureTable – labelled patch features with their provenance
// ---------------------------------------------------------------------------

/// One row per patch: source image index, patch origin, features and label.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub image: Vec<usize>,
    /// Top-left pixel `(x, y)` of each patch.
    pub origin: Vec<(usize, usize)>,
    pub features: Array2<f64>,
    pub labels: Vec<Label>,
}

impl FeatureTable {
    /// Append the patches of one image.
    pub(crate) fn append(
        &mut self,
        image: usize,
        grid: &PatchGrid,
        rows: Array2<f64>,
        labels: Vec<Label>,
    ) -> Result<()> {
        if rows.nrows() != labels.len() || rows.nrows() != grid.len() {
            return Err(SegmentationError::shape(
                "feature table rows",
                grid.len(),
                format!("{} features / {} labels", rows.nrows(), labels.len()),
            ));
        }
        self.features = if self.is_empty() {
            rows
        } else {
            concatenate(Axis(0), &[self.features.view(), rows.view()]).map_err(|_| {
                SegmentationError::shape("feature table width", self.features.ncols(), rows.ncols())
            })?
        };
        self.image.extend(std::iter::repeat(image).take(labels.len()));
        self.origin.extend(grid.origins());
        self.labels.extend(labels);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of road patches.
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| l.is_road()).count()
    }

    /// Names of the feature columns: channel means, then channel deviations.
    pub fn feature_names(&self) -> Vec<String> {
        let channels = self.features.ncols() / 2;
        let channel = |c: usize| match (channels, c) {
            (3, 0) => "r".to_string(),
            (3, 1) => "g".to_string(),
            (3, 2) => "b".to_string(),
            _ => format!("c{c}"),
        };
        (0..channels)
            .map(|c| format!("mean_{}", channel(c)))
            .chain((0..channels).map(|c| format!("std_{}", channel(c))))
            .collect()
    }

    /// Arrow view of the table: `image, x, y, <features>, label`.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new("image", DataType::UInt64, false),
            Field::new("x", DataType::UInt64, false),
            Field::new("y", DataType::UInt64, false),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(UInt64Array::from(
                self.image.iter().map(|&i| i as u64).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                self.origin.iter().map(|&(x, _)| x as u64).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                self.origin.iter().map(|&(_, y)| y as u64).collect::<Vec<_>>(),
            )),
        ];
        for (name, column) in self.feature_names().into_iter().zip(self.features.columns()) {
            fields.push(Field::new(name, DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(column.to_vec())));
        }
        fields.push(Field::new("label", DataType::UInt8, false));
        columns.push(Arc::new(UInt8Array::from(
            self.labels.iter().map(|l| l.as_u8()).collect::<Vec<_>>(),
        )));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write a feature table. Dispatch by extension:
/// * `.parquet` / `.pq` – one Arrow record batch
/// * `.csv`             – header row plus one line per patch
pub fn write_feature_table(path: &Path, table: &FeatureTable) -> Result<()> {
    match extension(path).as_str() {
        "parquet" | "pq" => write_parquet(path, table),
        "csv" => write_csv(path, table),
        other => Err(SegmentationError::UnsupportedFormat(other.to_string())),
    }
}

fn write_parquet(path: &Path, table: &FeatureTable) -> Result<()> {
    let batch = table.to_record_batch()?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_csv(path: &Path, table: &FeatureTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["image".to_string(), "x".to_string(), "y".to_string()];
    header.extend(table.feature_names());
    header.push("label".to_string());
    writer.write_record(&header)?;

    for (i, row) in table.features.rows().into_iter().enumerate() {
        let (x, y) = table.origin[i];
        let mut record = vec![table.image[i].to_string(), x.to_string(), y.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        record.push(table.labels[i].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PredictionRow<'a> {
    image: &'a str,
    x: usize,
    y: usize,
    prediction: u8,
}

/// Write per-patch predictions as CSV `image,x,y,prediction`.
///
/// `labels` is the flat prediction sequence for `names.len()` images that
/// all share `grid`.
pub fn write_patch_predictions(
    path: &Path,
    names: &[String],
    grid: &PatchGrid,
    labels: &[Label],
) -> Result<()> {
    if labels.len() != names.len() * grid.len() {
        return Err(SegmentationError::shape(
            "patch predictions",
            names.len() * grid.len(),
            labels.len(),
        ));
    }
    let mut writer = csv::Writer::from_path(path)?;
    if !grid.is_empty() {
        for (name, image_labels) in names.iter().zip(labels.chunks(grid.len())) {
            for ((x, y), label) in grid.origins().zip(image_labels) {
                writer.serialize(PredictionRow {
                    image: name,
                    x,
                    y,
                    prediction: label.as_u8(),
                })?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
