use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub mod targets;
pub mod urls;

/// The user whose name gets written into forms.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub name: String,
}

/// A form the agent is allowed to fill.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub id: String,
    /// Substring expected in the page URL.
    pub match_key: String,
    pub display_label: String,
    /// 0-based ordinal among the page's free-text fields.
    pub field_position: usize,
    pub record_email_toggle: bool,
}

impl TargetRecord {
    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.match_key)
    }
}

/// Everything the store persists, as one blob.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub struct StorageData {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub targets: Vec<TargetRecord>,
}

impl StorageData {
    /// Profile name, if one is set and not blank.
    pub fn profile_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }

    /// First target in list order whose match key occurs in `url`.
    pub fn target_for(&self, url: &str) -> Option<&TargetRecord> {
        self.targets.iter().find(|t| t.matches(url))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no config directory available on this platform")]
    NoConfigDir,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("no target with id {0}")]
    UnknownTarget(String),

    #[error("position {index} is out of range for {len} targets")]
    OutOfRange { index: usize, len: usize },
}

impl StoreError {
    /// Whether the error was caused by the caller's input rather than the disk.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::MissingField(_)
                | StoreError::UnknownTarget(_)
                | StoreError::OutOfRange { .. }
        )
    }
}

pub const CONFIG_ENV: &str = "FORM_AUTOFILL_CONFIG";
pub const CONFIG_FILE: &str = "config.json";

/// File-backed store shared by the CLI, the panel and the automation agent.
///
/// There is no locking across processes: each write replaces the whole blob,
/// and a reader in another process may observe the previous version.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$FORM_AUTOFILL_CONFIG`, else `<config dir>/form-autofill/config.json`.
    pub fn from_env() -> Result<Self, StoreError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Ok(Self::new(path));
            }
        }
        let dir = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(Self::new(dir.join("form-autofill").join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. Unreadable or missing storage reads as empty; use
    /// [`ConfigStore::load`] before writing anything back.
    pub async fn get(&self) -> StorageData {
        match self.load().await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "config unavailable, using empty state");
                StorageData::default()
            }
        }
    }

    pub async fn set_profile(&self, profile: Profile) -> Result<(), StoreError> {
        if profile.name.trim().is_empty() {
            return Err(StoreError::MissingField("profile name"));
        }
        let mut data = self.load().await?;
        data.profile = Some(profile);
        self.save(&data).await
    }

    pub async fn clear_profile(&self) -> Result<(), StoreError> {
        let mut data = self.load().await?;
        data.profile = None;
        self.save(&data).await
    }

    /// Replace the target list. Order is kept as given.
    pub async fn set_targets(&self, targets: Vec<TargetRecord>) -> Result<(), StoreError> {
        let mut data = self.load().await?;
        data.targets = targets;
        self.save(&data).await
    }

    /// Current state, failing on storage that exists but cannot be read.
    /// A missing file is the empty state.
    pub async fn load(&self) -> Result<StorageData, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file yet");
                return Ok(StorageData::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn save(&self, data: &StorageData) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        debug!(path = %self.path.display(), targets = data.targets.len(), "config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, key: &str) -> TargetRecord {
        TargetRecord {
            id: id.to_string(),
            match_key: key.to_string(),
            display_label: format!("form {id}"),
            field_position: 0,
            record_email_toggle: true,
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join(CONFIG_FILE));
        assert_eq!(store.get().await, StorageData::default());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, b"{ not json").unwrap();
        let store = ConfigStore::new(&path);
        assert_eq!(store.get().await, StorageData::default());
    }

    #[tokio::test]
    async fn profile_and_targets_share_one_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(CONFIG_FILE));

        store
            .set_targets(vec![record("b", "KEY_B"), record("a", "KEY_A")])
            .await
            .unwrap();
        store
            .set_profile(Profile {
                name: "Taro".to_string(),
            })
            .await
            .unwrap();

        let data = store.get().await;
        assert_eq!(data.profile_name(), Some("Taro"));
        let ids: Vec<_> = data.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);

        store.clear_profile().await.unwrap();
        let data = store.get().await;
        assert!(data.profile.is_none());
        assert_eq!(data.targets.len(), 2);
    }

    #[tokio::test]
    async fn blank_profile_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(CONFIG_FILE));
        let err = store
            .set_profile(Profile {
                name: "  ".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(store.get().await.profile.is_none());
    }

    #[tokio::test]
    async fn writes_refuse_to_replace_unreadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let before = r#"{"targets":[
            {"id":"a","matchKey":"A","displayLabel":"A","fieldPosition":0,"recordEmailToggle":true},
            {"id":"b","matchKey":"B","displayLabel":"B","fieldPosition":-1,"recordEmailToggle":true}
        ]}"#;
        std::fs::write(&path, before).unwrap();
        let store = ConfigStore::new(&path);

        let err = store
            .set_profile(Profile {
                name: "Taro".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
        assert!(!err.is_rejection());
        assert!(store.clear_profile().await.is_err());
        assert!(store.set_targets(Vec::new()).await.is_err());
        assert!(store.load().await.is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(store.get().await, StorageData::default());
    }

    #[tokio::test]
    async fn load_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(CONFIG_FILE));
        assert_eq!(store.load().await.unwrap(), StorageData::default());
    }

    #[test]
    fn blob_uses_camel_case_field_names() {
        let data = StorageData {
            profile: Some(Profile {
                name: "Taro".to_string(),
            }),
            targets: vec![record("1", "ABC123")],
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["profile"]["name"], "Taro");
        assert_eq!(value["targets"][0]["matchKey"], "ABC123");
        assert_eq!(value["targets"][0]["displayLabel"], "form 1");
        assert_eq!(value["targets"][0]["fieldPosition"], 0);
        assert_eq!(value["targets"][0]["recordEmailToggle"], true);
    }

    #[test]
    fn first_matching_target_wins() {
        let data = StorageData {
            profile: None,
            targets: vec![record("1", "ABC"), record("2", "ABC123")],
        };
        let url = "https://docs.google.com/forms/d/e/ABC123/viewform";
        assert_eq!(data.target_for(url).map(|t| t.id.as_str()), Some("1"));
        assert!(data.target_for("https://example.com/").is_none());
    }

    #[test]
    fn blank_profile_name_counts_as_absent() {
        let data = StorageData {
            profile: Some(Profile {
                name: " ".to_string(),
            }),
            targets: Vec::new(),
        };
        assert_eq!(data.profile_name(), None);
    }
}
