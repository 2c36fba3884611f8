use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::domain::location::{generate_location_id, Location};
use crate::domain::registry::LocationRegistry;
use crate::domain::schedule::ScheduleEntry;
use crate::error::RoutingError;

/// One row of a schedule's location CSV.
#[derive(Debug, Deserialize)]
struct LocationRow {
    name: String,
    latitude: f64,
    longitude: f64,
    wco_amount: f64,
    disposal_schedule: u32,
}

/// Loads per-schedule location CSVs into a registry. Every row gets a
/// generated `loc_<8hex>` id.
pub struct ScheduleLoader;

impl ScheduleLoader {
    pub fn load_schedule_data(
        schedule: &ScheduleEntry,
        base_path: &Path,
    ) -> Result<LocationRegistry, RoutingError> {
        let data_path = base_path.join(&schedule.file);
        let mut reader = csv::Reader::from_path(&data_path)?;

        let mut registry = LocationRegistry::new();
        for row in reader.deserialize() {
            let row: LocationRow = row?;
            if !(-90.0..=90.0).contains(&row.latitude)
                || !(-180.0..=180.0).contains(&row.longitude)
            {
                return Err(RoutingError::MalformedCoordinates(format!(
                    "{} ({}, {}) in {}",
                    row.name,
                    row.latitude,
                    row.longitude,
                    data_path.display()
                )));
            }
            registry.add(Location {
                id: generate_location_id(),
                name: row.name,
                coordinates: (row.latitude, row.longitude),
                wco_amount: row.wco_amount,
                disposal_schedule: row.disposal_schedule,
                distance_from_depot: 0.0,
            });
        }

        info!(
            "Loaded {} locations for schedule {} from {}",
            registry.len(),
            schedule.id,
            data_path.display()
        );
        Ok(registry)
    }

    /// Load and combine location data for every schedule, unioned by id.
    pub fn load_all_schedules(
        schedules: &[ScheduleEntry],
        base_path: &Path,
    ) -> Result<LocationRegistry, RoutingError> {
        let mut combined = LocationRegistry::new();
        for schedule in schedules {
            let registry = Self::load_schedule_data(schedule, base_path)?;
            combined.merge(registry);
        }
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        writeln!(file, "name,latitude,longitude,wco_amount,disposal_schedule").unwrap();
        write!(file, "{body}").unwrap();
    }

    #[test]
    fn loads_rows_and_generates_ids() {
        let dir = std::env::temp_dir().join("wco_loader_test_basic");
        std::fs::create_dir_all(&dir).unwrap();
        write_csv(
            &dir,
            "weekly.csv",
            "Fried Chicken Hub,7.0712,125.6123,120.5,7\nNoodle House,7.0801,125.6010,45.0,7\n",
        );

        let mut schedule = ScheduleEntry::new("weekly", "Weekly", 7);
        schedule.file = "weekly.csv".into();

        let registry = ScheduleLoader::load_schedule_data(&schedule, &dir).unwrap();
        assert_eq!(registry.len(), 2);
        let first = registry.iter().next().unwrap();
        assert!(first.id.starts_with("loc_"));
        assert_eq!(first.name, "Fried Chicken Hub");
        assert_eq!(first.disposal_schedule, 7);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let dir = std::env::temp_dir().join("wco_loader_test_badcoords");
        std::fs::create_dir_all(&dir).unwrap();
        write_csv(&dir, "bad.csv", "Broken,95.0,500.0,10.0,7\n");

        let mut schedule = ScheduleEntry::new("bad", "Bad", 7);
        schedule.file = "bad.csv".into();

        let err = ScheduleLoader::load_schedule_data(&schedule, &dir).unwrap_err();
        assert!(matches!(err, RoutingError::MalformedCoordinates(_)));
    }

    #[test]
    fn missing_file_is_an_io_class_error() {
        let mut schedule = ScheduleEntry::new("none", "None", 7);
        schedule.file = "does_not_exist.csv".into();
        let err = ScheduleLoader::load_schedule_data(&schedule, Path::new("/nonexistent-dir"));
        assert!(err.is_err());
    }
}
