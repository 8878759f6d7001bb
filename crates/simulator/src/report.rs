//! Result-file writing.

use leosim_simulation::SimulationReport;
use std::io;
use std::path::Path;
use tracing::info;

/// Write the rendered report to `path`, creating parent directories as
/// needed. The format is the line-oriented scalar/vector table produced by
/// [`SimulationReport::render`].
pub fn write(report: &SimulationReport, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, report.render())?;
    info!(path = %path.display(), nodes = report.nodes.len(), "results written");
    Ok(())
}
