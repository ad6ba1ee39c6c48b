//! External fetch tool integration.
//!
//! - [`FetchTool`]: the narrow interface the pipeline depends on
//! - [`YtDlpTool`]: runs `yt-dlp` as a subprocess
//! - [`ProgressMonitor`]: polls the partial output file and reports growth

mod output_record_reader;
mod progress;
mod traits;
mod ytdlp;

pub use output_record_reader::OutputRecordReader;
pub use progress::{ProgressConfig, ProgressMonitor, ProgressSink, describe_progress, partial_path};
pub use traits::FetchTool;
pub use ytdlp::{FetchToolConfig, YtDlpTool};
