use crate::oauth2::{CredentialRecord, OAuth2Error, OAuth2Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const CREDENTIAL_FILE: &str = "credential.json";
const CREDENTIAL_TMP_FILE: &str = "credential.json.tmp";

/// File-backed storage for the credential record
#[derive(Debug, Clone)]
pub struct CredentialStorage {
    config_dir: PathBuf,
}

impl CredentialStorage {
    /// Create storage rooted at `config_dir`, creating the directory if needed
    pub fn new(config_dir: impl Into<PathBuf>) -> OAuth2Result<Self> {
        let config_dir = config_dir.into();

        if !config_dir.exists() {
            tracing::debug!("Creating config directory: {:?}", config_dir);
            fs::create_dir_all(&config_dir).map_err(|e| {
                OAuth2Error::StorageError(format!("Failed to create config directory: {}", e))
            })?;
        }

        Ok(Self { config_dir })
    }

    pub fn credential_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIAL_FILE)
    }

    /// Load the stored record, if any
    pub fn load(&self) -> OAuth2Result<Option<CredentialRecord>> {
        let path = self.credential_path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(|e| {
            OAuth2Error::StorageError(format!("Failed to read credential: {}", e))
        })?;

        let record: CredentialRecord = serde_json::from_str(&json).map_err(|e| {
            OAuth2Error::StorageError(format!("Failed to parse credential: {}", e))
        })?;

        if record.error.is_some() {
            tracing::warn!("Stored credential is in the error state and needs re-authorization");
        }

        Ok(Some(record))
    }

    /// Persist the record, readable by the owner only.
    ///
    /// The record is written to a sibling temp file created with mode 0600
    /// and renamed over the old one, so the previous refresh token survives
    /// an interrupted write.
    pub fn save(&self, record: &CredentialRecord) -> OAuth2Result<()> {
        let path = self.credential_path();
        let tmp_path = self.config_dir.join(CREDENTIAL_TMP_FILE);
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            OAuth2Error::StorageError(format!("Failed to serialize credential: {}", e))
        })?;

        let written = write_private(&tmp_path, json.as_bytes()).and_then(|()| {
            fs::rename(&tmp_path, &path).map_err(|e| {
                OAuth2Error::StorageError(format!("Failed to replace credential: {}", e))
            })
        });
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written?;

        tracing::debug!("Credential saved to {:?}", path);
        Ok(())
    }

    /// Remove the stored record
    pub fn delete(&self) -> OAuth2Result<()> {
        let path = self.credential_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                OAuth2Error::StorageError(format!("Failed to delete credential: {}", e))
            })?;
        }
        Ok(())
    }
}

fn write_private(path: &Path, contents: &[u8]) -> OAuth2Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        OAuth2Error::StorageError(format!("Failed to create credential file: {}", e))
    })?;
    file.write_all(contents)
        .and_then(|()| file.sync_all())
        .map_err(|e| OAuth2Error::StorageError(format!("Failed to write credential: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_credential() {
        let dir = tempdir().unwrap();
        let storage = CredentialStorage::new(dir.path()).unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip_keeps_error_flag() {
        let dir = tempdir().unwrap();
        let storage = CredentialStorage::new(dir.path().join("nested")).unwrap();

        let mut record = CredentialRecord::new(
            "access".to_string(),
            Some("refresh".to_string()),
            chrono::Utc::now(),
        );
        record.mark_failed("invalid_grant");
        storage.save(&record).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(loaded.error.unwrap().reason, "invalid_grant");

        storage.delete().unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = CredentialStorage::new(dir.path()).unwrap();
        let record = CredentialRecord::new("a".to_string(), None, chrono::Utc::now());
        storage.save(&record).unwrap();

        let mode = fs::metadata(storage.credential_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!dir.path().join(CREDENTIAL_TMP_FILE).exists());
    }

    #[test]
    fn test_failed_save_keeps_previous_record() {
        let dir = tempdir().unwrap();
        let storage = CredentialStorage::new(dir.path()).unwrap();
        let first = CredentialRecord::new(
            "first".to_string(),
            Some("refresh-1".to_string()),
            chrono::Utc::now(),
        );
        storage.save(&first).unwrap();

        // A directory in the temp file's place makes the write fail
        fs::create_dir(dir.path().join(CREDENTIAL_TMP_FILE)).unwrap();
        let second = CredentialRecord::new("second".to_string(), None, chrono::Utc::now());
        assert!(matches!(storage.save(&second), Err(OAuth2Error::StorageError(_))));

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "first");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let storage = CredentialStorage::new(dir.path()).unwrap();
        std::fs::write(storage.credential_path(), "not json").unwrap();

        assert!(matches!(storage.load(), Err(OAuth2Error::StorageError(_))));
    }
}
