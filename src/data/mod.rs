/// Data layer: core types, discovery, frame assignment, loading, merging.
///
/// Architecture:
/// ```text
///  <dir>/*_morphometry_results.csv
///        │
///        ▼
///   ┌──────────┐
///   │ discover │  list + sort by name → Vec<InputFile>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  frames  │  position → Frame, TimeSec, TimeMin
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse CSVs (sequential or worker pool) → FrameRecord
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize │  concat, check selection, coerce numbers → MergedDataset
///   └───────────┘
/// ```

pub mod discover;
pub mod frames;
pub mod loader;
pub mod model;
pub mod normalize;
