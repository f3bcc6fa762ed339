//! Zone definitions stored as one JSON file per area.
//!
//! Files are named `zones_{area}.json` and hold either a bare array of zones or
//! an object of the form `{"zones": [...]}`.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crowd_models::{AreaId, Zone};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Revision, ZoneStore};

#[derive(Deserialize)]
#[serde(untagged)]
enum ZoneFile {
    List(Vec<Value>),
    Wrapped { zones: Vec<Value> },
}

#[derive(Serialize)]
struct ZoneFileOut<'a> {
    zones: &'a [Zone],
}

/// Directory-backed zone store.
#[derive(Debug, Clone)]
pub struct ZoneFileStore {
    dir: PathBuf,
}

impl ZoneFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the zone file for an area.
    ///
    /// Ids that could name a file outside the zone directory are rejected.
    pub fn path_for(&self, area: &AreaId) -> StoreResult<PathBuf> {
        let id = area.as_str();
        if id.is_empty() || id.contains(['/', '\\', '\0']) || id.contains("..") {
            return Err(StoreError::invalid(format!("area id {:?} is not a valid file name", id)));
        }
        Ok(self.dir.join(format!("zones_{}.json", id)))
    }

    /// Write an area's zone set, replacing any previous definition.
    pub fn save(&self, area: &AreaId, zones: &[Zone]) -> StoreResult<()> {
        let path = self.path_for(area)?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&ZoneFileOut { zones })?;
        fs::write(path, json)?;
        debug!(area = %area, zones = zones.len(), "Saved zone file");
        Ok(())
    }
}

/// Parse zone file content. Entries that fail to parse or validate are dropped.
fn parse_zones(area: &AreaId, content: &str) -> StoreResult<Vec<Zone>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw = match serde_json::from_str::<ZoneFile>(content) {
        Ok(ZoneFile::List(items)) | Ok(ZoneFile::Wrapped { zones: items }) => items,
        Err(e) => return Err(StoreError::malformed(format!("zones_{}.json: {}", area, e))),
    };

    let mut seen = HashSet::new();
    let mut zones = Vec::with_capacity(raw.len());
    for item in raw {
        let zone = match serde_json::from_value::<Zone>(item) {
            Ok(z) => z,
            Err(e) => {
                warn!(area = %area, error = %e, "Skipping unparseable zone entry");
                continue;
            }
        };
        let zone = match zone.validated() {
            Ok(z) => z,
            Err(e) => {
                warn!(area = %area, error = %e, "Skipping invalid zone");
                continue;
            }
        };
        if !seen.insert(zone.id) {
            warn!(area = %area, zone_id = zone.id, "Skipping duplicate zone id");
            continue;
        }
        zones.push(zone);
    }

    Ok(zones)
}

impl ZoneStore for ZoneFileStore {
    fn load(&self, area: &AreaId) -> StoreResult<Vec<Zone>> {
        let path = self.path_for(area)?;
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(area = %area, path = %path.display(), "No zone file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        parse_zones(area, &content)
    }

    fn revision(&self, area: &AreaId) -> Option<Revision> {
        let modified = fs::metadata(self.path_for(area).ok()?).ok()?.modified().ok()?;
        let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
        Some(Revision(nanos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowd_models::Point;
    use tempfile::TempDir;

    fn area() -> AreaId {
        AreaId::from("entrance")
    }

    #[test]
    fn test_area_ids_cannot_escape_zone_dir() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path().join("zones"));

        for id in ["../x", "a/b", "a\\b", "..", ""] {
            let area = AreaId::from(id);
            assert!(matches!(store.path_for(&area), Err(StoreError::Invalid(_))), "{:?}", id);
            assert!(matches!(store.load(&area), Err(StoreError::Invalid(_))));
            assert!(store.revision(&area).is_none());
            assert!(store.save(&area, &[]).is_err());
        }
        assert!(!dir.path().join("x").exists());
        assert!(!dir.path().join("zones_x.json").exists());

        let path = store.path_for(&AreaId::from("food.court")).unwrap();
        assert_eq!(path, dir.path().join("zones").join("zones_food.court.json"));
    }

    #[test]
    fn test_missing_file_is_empty_zone_set() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path());

        assert!(store.load(&area()).unwrap().is_empty());
        assert!(store.revision(&area()).is_none());
    }

    #[test]
    fn test_bare_array_format() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path());
        fs::write(
            store.path_for(&area()).unwrap(),
            r#"[{"id": 1, "name": "Door", "points": [[0, 0], [50, 0], [50, 50], [0, 50]]}]"#,
        )
        .unwrap();

        let zones = store.load(&area()).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "Door");
        assert!(store.revision(&area()).is_some());
    }

    #[test]
    fn test_wrapped_format_round_trips_through_save() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path());
        let zones = vec![
            Zone::rectangle(1, "Left", 0.0, 0.0, 100.0, 100.0),
            Zone::rectangle(2, "Right", 100.0, 0.0, 200.0, 100.0),
        ];

        store.save(&area(), &zones).unwrap();
        let raw = fs::read_to_string(store.path_for(&area()).unwrap()).unwrap();
        assert!(raw.contains("\"zones\""));

        assert_eq!(store.load(&area()).unwrap(), zones);
    }

    #[test]
    fn test_empty_file_is_empty_zone_set() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path());
        fs::write(store.path_for(&area()).unwrap(), "  \n").unwrap();

        assert!(store.load(&area()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path());
        fs::write(store.path_for(&area()).unwrap(), "{not json").unwrap();

        let err = store.load(&area()).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn test_invalid_and_duplicate_zones_are_dropped() {
        let dir = TempDir::new().unwrap();
        let store = ZoneFileStore::new(dir.path());
        fs::write(
            store.path_for(&area()).unwrap(),
            r#"{"zones": [
                {"id": 1, "points": [[0, 0], [10, 0], [10, 10]]},
                {"id": 2, "points": [[0, 0], [10, 0]]},
                {"id": 1, "name": "Again", "points": [[0, 0], [20, 0], [20, 20]]},
                {"name": "No id", "points": [[0, 0], [20, 0], [20, 20]]}
            ]}"#,
        )
        .unwrap();

        let zones = store.load(&area()).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "Zone_1");
        assert_eq!(zones[0].points[2], Point::new(10.0, 10.0));
    }
}
