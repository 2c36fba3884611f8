use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::json;
use tracing::info;

use crate::domain::analysis::{RouteAnalysisResult, ScheduleReport};
use crate::error::RoutingError;

/// Timestamped directory under `base` for this run's artifacts.
pub fn create_output_directory(base: &Path) -> Result<PathBuf, RoutingError> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_dir = base.join(timestamp);
    fs::create_dir_all(&output_dir)?;
    info!("Output directory created at: {}", output_dir.display());
    Ok(output_dir)
}

/// Write one directory per schedule, containing `analysis_dayN.json` for
/// each day result plus a `schedule_summary.json` rollup.
pub fn write_schedule_artifacts(
    output_dir: &Path,
    results: &[RouteAnalysisResult],
    reports: &[ScheduleReport],
) -> Result<(), RoutingError> {
    let mut by_schedule: BTreeMap<&str, Vec<&RouteAnalysisResult>> = BTreeMap::new();
    for result in results {
        by_schedule
            .entry(result.base_schedule_id.as_str())
            .or_default()
            .push(result);
    }

    for (base_id, mut day_results) in by_schedule {
        day_results.sort_by_key(|r| r.collection_day);

        let schedule_dir = output_dir.join(base_id);
        fs::create_dir_all(&schedule_dir)?;

        for result in &day_results {
            let path = schedule_dir.join(format!("analysis_day{}.json", result.collection_day));
            fs::write(&path, serde_json::to_string_pretty(result)?)?;
            info!("Analysis data saved for {}", result.schedule_name);
        }

        let report = reports.iter().find(|r| r.schedule_id == base_id);
        let summary = json!({
            "schedule_id": base_id,
            "days": day_results.iter().map(|r| r.collection_day).collect::<Vec<_>>(),
            "total_distance": day_results.iter().map(|r| r.total_distance).sum::<f64>(),
            "total_collected": day_results.iter().map(|r| r.total_collected).sum::<f64>(),
            "total_trips": day_results.iter().map(|r| r.total_trips).sum::<usize>(),
            "total_stops": day_results.iter().map(|r| r.total_stops).sum::<usize>(),
            "report": report,
        });
        fs::write(
            schedule_dir.join("schedule_summary.json"),
            serde_json::to_string_pretty(&summary)?,
        )?;
    }

    Ok(())
}
