use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::constant::COLLECTION_TIME_MINUTES;

fn default_collection_time() -> f64 {
    COLLECTION_TIME_MINUTES
}

/// One recurring pickup cadence. `frequency` is the period in days and
/// doubles as the day index the schedule materializes on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub name: String,
    pub frequency: u32,
    /// Location data file for this schedule; opaque to the routing core.
    #[serde(default)]
    pub file: String,
    #[serde(default = "default_collection_time")]
    pub collection_time_minutes: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ScheduleEntry {
    pub fn new(id: &str, name: &str, frequency: u32) -> Self {
        ScheduleEntry {
            id: id.to_string(),
            name: name.to_string(),
            frequency,
            file: String::new(),
            collection_time_minutes: default_collection_time(),
            description: None,
            color: None,
        }
    }
}

// Identity is the id alone; two entries with the same id are the same
// schedule regardless of presentation fields.
impl PartialEq for ScheduleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScheduleEntry {}

impl Hash for ScheduleEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
