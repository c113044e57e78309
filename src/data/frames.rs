use super::model::{FrameInfo, InputFile};

/// Frame and elapsed time for the file at 1-based position `position`.
/// Position 0 is treated as the first frame's time offset.
pub fn frame_info(position: u32, interval_secs: f64) -> FrameInfo {
    let time_sec = f64::from(position.saturating_sub(1)) * interval_secs;
    FrameInfo {
        frame: position,
        time_sec,
        time_min: time_sec / 60.0,
    }
}

/// Assign frames `1..=N` to already sorted files.
///
/// `interval_secs` is validated as positive by the run configuration.
pub fn assign_frames(files: &[InputFile], interval_secs: f64) -> Vec<(FrameInfo, InputFile)> {
    files
        .iter()
        .zip(1u32..)
        .map(|(file, position)| (frame_info(position, interval_secs), file.clone()))
        .collect()
}
