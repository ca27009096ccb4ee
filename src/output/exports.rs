use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Result;
use crate::insights::AnalysisReport;

/// Writes the report as JSON.
pub fn export_json(report: &AnalysisReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

/// File name for a report: `pipelens_<mode>_<timestamp>.json`.
pub fn report_file_name(report: &AnalysisReport) -> String {
    format!(
        "pipelens_{}_{}.json",
        report.mode.as_str(),
        report.generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes the report into `dir`, creating the directory if needed.
///
/// Returns the path of the written file.
pub fn write_report_file(report: &AnalysisReport, dir: &Path, pretty: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(report));

    let mut file = std::fs::File::create(&path)?;
    export_json(report, pretty, &mut file)?;

    info!("Report written to: {}", path.display());
    Ok(path)
}
