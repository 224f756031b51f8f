//! Reading and patching the YOLO dataset descriptor (`data.yaml`).

use crate::error::{DatasetError, DescriptorError};
use serde_yaml::Value;
use std::path::Path;

/// Result of a best-effort provenance lookup.
///
/// A failed lookup is not an error: `url` is `None` and `warning` describes
/// what went wrong so the caller can surface it once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceLookup {
    pub url: Option<String>,
    pub warning: Option<String>,
}

/// Extract `roboflow.url` from the descriptor at `path`.
pub fn read_provenance(path: &Path) -> ProvenanceLookup {
    match try_read_provenance(path) {
        Ok(url) => ProvenanceLookup {
            url: Some(url),
            warning: None,
        },
        Err(e) => ProvenanceLookup {
            url: None,
            warning: Some(format!(
                "Could not read dataset provenance from {}: {e}",
                path.display()
            )),
        },
    }
}

fn try_read_provenance(path: &Path) -> Result<String, DescriptorError> {
    let content = std::fs::read_to_string(path)?;
    let doc: Value = serde_yaml::from_str(&content)?;
    doc.get("roboflow")
        .and_then(|r| r.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DescriptorError::MissingField {
            field: "roboflow.url",
        })
}

/// Split entries rewritten to point inside the dataset folder.
const SPLIT_KEYS: [&str; 3] = ["train", "val", "test"];

/// Point the `train`/`val`/`test` entries of a freshly extracted descriptor
/// at the dataset folder, so the file works from any working directory.
///
/// `../train/images` in a dataset at `/data/Jam-9` becomes
/// `/data/Jam-9/train/images`. Non-string entries are left alone.
pub fn rewrite_split_paths(descriptor: &Path, dataset_dir: &Path) -> Result<(), DatasetError> {
    let to_err = |message: String| DatasetError::Descriptor {
        path: descriptor.to_path_buf(),
        message,
    };

    let content = std::fs::read_to_string(descriptor)?;
    let mut doc: Value = serde_yaml::from_str(&content).map_err(|e| to_err(e.to_string()))?;
    let Some(map) = doc.as_mapping_mut() else {
        return Err(to_err("top level is not a mapping".to_string()));
    };

    for key in SPLIT_KEYS {
        let Some(Value::String(relative)) = map.get(key) else {
            continue;
        };
        let trimmed = relative.trim_start_matches(['.', '/']);
        let absolute = dataset_dir.join(trimmed);
        map.insert(
            Value::String(key.to_string()),
            Value::String(absolute.to_string_lossy().into_owned()),
        );
    }

    let updated = serde_yaml::to_string(&doc).map_err(|e| to_err(e.to_string()))?;
    std::fs::write(descriptor, updated)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("data.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_provenance_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "names: [truck]\nroboflow:\n  url: \"https://example.test/x\"\n  version: 9\n",
        );
        let lookup = read_provenance(&path);
        assert_eq!(lookup.url.as_deref(), Some("https://example.test/x"));
        assert_eq!(lookup.warning, None);
    }

    #[test]
    fn test_provenance_missing_roboflow_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "names: [truck]\nnc: 1\n");
        let lookup = read_provenance(&path);
        assert_eq!(lookup.url, None);
        let warning = lookup.warning.unwrap();
        assert!(warning.contains("data.yaml"));
        assert!(warning.contains("roboflow.url"));
    }

    #[test]
    fn test_provenance_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = read_provenance(&dir.path().join("absent.yaml"));
        assert_eq!(lookup.url, None);
        assert!(lookup.warning.unwrap().contains("absent.yaml"));
    }

    #[test]
    fn test_provenance_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "roboflow: [unclosed\n");
        let lookup = read_provenance(&path);
        assert_eq!(lookup.url, None);
        assert!(lookup.warning.is_some());
    }

    #[test]
    fn test_provenance_non_string_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "roboflow:\n  url: 42\n");
        let lookup = read_provenance(&path);
        assert_eq!(lookup.url, None);
        assert!(lookup.warning.is_some());
    }

    #[test]
    fn test_rewrite_split_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "train: ../train/images\nval: ../valid/images\ntest: ../test/images\nnc: 1\nnames: [truck]\n",
        );
        rewrite_split_paths(&path, dir.path()).unwrap();

        let doc: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let expected_train = dir.path().join("train/images");
        let expected_val = dir.path().join("valid/images");
        assert_eq!(
            doc["train"].as_str().unwrap(),
            expected_train.to_string_lossy()
        );
        assert_eq!(doc["val"].as_str().unwrap(), expected_val.to_string_lossy());
        assert_eq!(doc["nc"].as_u64(), Some(1));
    }

    #[test]
    fn test_rewrite_leaves_missing_splits_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "train: train/images\nnc: 1\n");
        rewrite_split_paths(&path, dir.path()).unwrap();

        let doc: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc.get("test").is_none());
        assert_eq!(
            doc["train"].as_str().unwrap(),
            dir.path().join("train/images").to_string_lossy()
        );
    }

    #[test]
    fn test_rewrite_rejects_non_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "- a\n- b\n");
        let err = rewrite_split_paths(&path, dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Descriptor { .. }));
    }
}
