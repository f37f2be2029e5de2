//! Versioned blob area for persisted models. Names follow
//! `<prefix><version>.<ext>`, e.g. `model-7.pkl`.

use std::fs;
use std::path::PathBuf;

use crate::error::StorageError;

pub trait ArtifactArea {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
    fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError>;
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Numeric version of `name` under `prefix`, ignoring the extension.
pub fn version_of(name: &str, prefix: &str) -> Option<u64> {
    let rest = name.strip_prefix(prefix)?;
    let digits = rest.split('.').next()?;
    digits.parse().ok()
}

/// The candidate with the highest numeric version suffix.
pub fn latest_version<'a>(names: &'a [String], prefix: &str) -> Option<(&'a str, u64)> {
    names
        .iter()
        .filter_map(|name| version_of(name, prefix).map(|v| (name.as_str(), v)))
        .max_by_key(|(_, v)| *v)
}

pub fn next_version_name(names: &[String], prefix: &str, ext: &str) -> String {
    let next = latest_version(names, prefix).map_or(1, |(_, v)| v + 1);
    format!("{prefix}{next}.{ext}")
}

/// Bytes of the newest artifact under `prefix`, with its name.
pub fn fetch_latest(
    area: &dyn ArtifactArea,
    prefix: &str,
) -> Result<Option<(String, Vec<u8>)>, StorageError> {
    let names = area.list(prefix)?;
    let Some((name, _)) = latest_version(&names, prefix) else {
        return Ok(None);
    };
    let bytes = area.fetch(name)?;
    Ok(Some((name.to_string(), bytes)))
}

/// Publishes `bytes` under the next free version; returns the name used.
pub fn publish(
    area: &dyn ArtifactArea,
    prefix: &str,
    ext: &str,
    bytes: &[u8],
) -> Result<String, StorageError> {
    let names = area.list(prefix)?;
    let name = next_version_name(&names, prefix, ext);
    area.put(&name, bytes)?;
    Ok(name)
}

pub struct LocalArtifactArea {
    root: PathBuf,
}

impl LocalArtifactArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactArea for LocalArtifactArea {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        for entry in dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
                && name.starts_with(prefix)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.root.join(name))?)
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        // Hidden and suffixed so an interrupted write never matches a prefix.
        let tmp = self.root.join(format!(".{name}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn picks_highest_numeric_not_lexical() {
        let list = names(&["model-2.pkl", "model-10.pkl", "model-9.pkl", "model-x.pkl", "scaler-30.pkl"]);
        assert_eq!(latest_version(&list, "model-"), Some(("model-10.pkl", 10)));
        assert_eq!(next_version_name(&list, "model-", "pkl"), "model-11.pkl");
        assert_eq!(next_version_name(&[], "model-", "pkl"), "model-1.pkl");
    }

    #[test]
    fn local_area_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let area = LocalArtifactArea::new(dir.path().join("models"));
        assert!(fetch_latest(&area, "model-").unwrap().is_none());

        assert_eq!(publish(&area, "model-", "pkl", b"first").unwrap(), "model-1.pkl");
        assert_eq!(publish(&area, "model-", "pkl", b"second").unwrap(), "model-2.pkl");
        area.put("scaler-1.pkl", b"scaler").unwrap();

        let (name, bytes) = fetch_latest(&area, "model-").unwrap().unwrap();
        assert_eq!(name, "model-2.pkl");
        assert_eq!(bytes, b"second");
        assert_eq!(area.list("scaler-").unwrap(), vec!["scaler-1.pkl".to_string()]);
    }

    #[test]
    fn interrupted_publish_is_never_latest() {
        let dir = tempfile::tempdir().unwrap();
        let area = LocalArtifactArea::new(dir.path());
        area.put("model-2.pkl", b"good").unwrap();
        std::fs::write(dir.path().join(".model-3.pkl.tmp"), b"partial").unwrap();

        let (name, bytes) = fetch_latest(&area, "model-").unwrap().unwrap();
        assert_eq!(name, "model-2.pkl");
        assert_eq!(bytes, b"good");
        assert_eq!(area.list("model-").unwrap(), vec!["model-2.pkl".to_string()]);

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 1);
    }
}
