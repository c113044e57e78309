use std::fmt;
use std::path::PathBuf;

/// Derived column holding the 1-based frame index.
pub const FRAME_COLUMN: &str = "Frame";
/// Derived column holding elapsed seconds since the first frame.
pub const TIME_SEC_COLUMN: &str = "TimeSec";
/// Derived column holding elapsed minutes since the first frame.
pub const TIME_MIN_COLUMN: &str = "TimeMin";
/// Derived column holding the name of the file a row came from.
pub const SOURCE_FILE_COLUMN: &str = "SourceFile";

/// Field contents read as missing values, matching the markers common
/// dataframe CSV readers treat as NA by default.
pub const NA_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// CellValue – a single cell of a measurement table
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell. Cells start out as whatever the CSV text
/// looked like and may later be coerced to `Float` by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl CellValue {
    /// Guess the narrowest type for a raw CSV field. Missing-value markers
    /// become `Null`; numbers may carry surrounding whitespace, text is kept
    /// verbatim.
    pub fn infer(s: &str) -> Self {
        if NA_MARKERS.contains(&s) {
            return CellValue::Null;
        }
        let trimmed = s.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return CellValue::Float(f);
        }
        CellValue::Text(s.to_string())
    }

    /// Numeric view of the cell, `None` for text and nulls.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Integer(_) | CellValue::Float(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// CSV rendering of a float: integral values keep one decimal place, NaN is
/// written as an empty field.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{}", format_float(*v)),
            CellValue::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Input files and frames
// ---------------------------------------------------------------------------

/// One discovered measurement file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Frame index and elapsed time assigned to one input file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub frame: u32,
    pub time_sec: f64,
    pub time_min: f64,
}

/// The parsed rows of one input file, tagged with its frame.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub info: FrameInfo,
    pub source_file: String,
    /// Header of the source file, without the derived columns.
    pub columns: Vec<String>,
    /// Rows aligned with `columns`.
    pub rows: Vec<Vec<CellValue>>,
}

// ---------------------------------------------------------------------------
// MergedDataset – all frames concatenated
// ---------------------------------------------------------------------------

/// Every input row in file order then row order, aligned to the union of
/// all file headers. Cells for columns a file lacks are `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl MergedDataset {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
