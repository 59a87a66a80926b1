/// Data layer: core types, loading, patching and export.
///
/// Architecture:
/// ```text
///  images/*.png  groundtruth/*.png
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  decode PNG → Image / Mask in [0, 1]
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  patch    │  PatchGrid, crop → patches, labels → masks
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  FeatureTable → .parquet / .csv, predictions → .csv
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
pub mod patch;
