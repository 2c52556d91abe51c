use crate::error::ControllerError;
use njord_bus::Bus;
use njord_journal::Journal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// SHA-256 over the concatenated bytes of every loaded config file, in the
/// order given. Changing any byte of any layer changes the hash (spec
/// §4.K, §6).
pub fn config_hash(paths: &[impl AsRef<Path>]) -> Result<String, ControllerError> {
    let mut hasher = Sha256::new();
    for path in paths {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ControllerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventKind {
    Start,
    Reload,
    End,
}

/// One journalled lifecycle record for a controller session (spec §4.K:
/// "journalled with start/stop times, config hash, and service list").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub kind: SessionEventKind,
    pub ts_ns: i64,
    pub config_hash: String,
    pub services: Vec<String>,
}

/// Bracket of a controller invocation: a UUID assigned at start, ended at
/// stop, journalled on every lifecycle transition.
pub struct Session {
    pub id: Uuid,
    pub config_hash: String,
    pub services: Vec<String>,
    journal: Journal,
}

impl Session {
    pub async fn start(
        journal: Journal,
        config_paths: &[impl AsRef<Path>],
        services: Vec<String>,
        now_ns: i64,
    ) -> Result<Self, ControllerError> {
        let hash = config_hash(config_paths)?;
        let session = Self {
            id: Uuid::new_v4(),
            config_hash: hash,
            services,
            journal,
        };
        session
            .journal
            .append(&SessionRecord {
                session_id: session.id,
                kind: SessionEventKind::Start,
                ts_ns: now_ns,
                config_hash: session.config_hash.clone(),
                services: session.services.clone(),
            })
            .await
            .map_err(|e| ControllerError::Journal(e.to_string()))?;
        Ok(session)
    }

    /// Recompute the config hash and publish `controller.reload` so every
    /// service can refresh its config from the source without restarting
    /// (spec §4.K). Journals the transition too.
    pub async fn reload(
        &mut self,
        bus: &Bus,
        config_paths: &[impl AsRef<Path>],
        now_ns: i64,
    ) -> Result<(), ControllerError> {
        self.config_hash = config_hash(config_paths)?;
        bus.publish("controller.reload", &self.config_hash)
            .await
            .map_err(|e| ControllerError::Bus(e.to_string()))?;
        self.journal
            .append(&SessionRecord {
                session_id: self.id,
                kind: SessionEventKind::Reload,
                ts_ns: now_ns,
                config_hash: self.config_hash.clone(),
                services: self.services.clone(),
            })
            .await
            .map_err(|e| ControllerError::Journal(e.to_string()))
    }

    pub async fn end(self, now_ns: i64) -> Result<(), ControllerError> {
        self.journal
            .append(&SessionRecord {
                session_id: self.id,
                kind: SessionEventKind::End,
                ts_ns: now_ns,
                config_hash: self.config_hash.clone(),
                services: self.services.clone(),
            })
            .await
            .map_err(|e| ControllerError::Journal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn hash_changes_when_file_contents_change() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"app:\n  env: dev\n").unwrap();
        let first = config_hash(&[file.path()]).unwrap();

        file.write_all(b"extra\n").unwrap();
        let second = config_hash(&[file.path()]).unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn start_and_end_journal_matching_session_id() {
        let dir = tempdir().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"app:\n  env: dev\n").unwrap();

        let journal = Journal::new(dir.path(), "controller.session", None);
        let session = Session::start(journal, &[file.path()], vec!["bus".to_string()], 0)
            .await
            .unwrap();
        let id = session.id;
        session.end(1).await.unwrap();

        let content = std::fs::read_to_string(
            dir.path()
                .join(format!("controller.session.{}.ndjson", chrono::Utc::now().format("%Y-%m-%d"))),
        )
        .unwrap();
        assert!(content.contains(&id.to_string()));
        assert!(content.contains("\"Start\""));
        assert!(content.contains("\"End\""));
    }
}
