mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{export_json, write_report_file};
pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::print_summary;

/// Prints the `pipelens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔭 pipelens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("DevOps & MLOps Issue Detection")
    );
}
