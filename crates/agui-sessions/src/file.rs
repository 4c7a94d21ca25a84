use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agui_protocol::{BridgeError, BridgeResult, Session, SessionEvent, SessionId, SessionStore};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument, warn};

/// One line of a session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum SessionRecord {
    Created {
        session_id: SessionId,
        app_name: String,
        user_id: String,
        created_at: DateTime<Utc>,
    },
    Appended {
        event: SessionEvent,
    },
}

type LockMap = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

/// Exclusive hold on one session log. Dropping it releases the log and
/// forgets the path once no other caller holds or awaits it.
struct LogLock<'a> {
    locks: &'a LockMap,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LogLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        drop(self.guard.take());
        if locks
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.path);
        }
    }
}

/// Session store that keeps one append-only JSONL log per session under
/// `<root>/sessions/<app>/<user>/<session>.jsonl`.
#[derive(Debug)]
pub struct FileSessionStore {
    root: PathBuf,
    write_locks: LockMap,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, app_name: &str, user_id: &str, session_id: &SessionId) -> Result<PathBuf> {
        Ok(self
            .root
            .join("sessions")
            .join(checked_segment(app_name)?)
            .join(checked_segment(user_id)?)
            .join(format!("{}.jsonl", checked_segment(session_id.as_str())?)))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create sessions dir {parent:?}"))?;
        }
        Ok(())
    }

    async fn lock_log(&self, path: &Path) -> LogLock<'_> {
        let lock = self
            .write_locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        let mut held = LogLock {
            locks: &self.write_locks,
            path: path.to_path_buf(),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    async fn append_record(path: &Path, record: &SessionRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed opening session log {path:?}"))?;

        let mut line = Vec::new();
        if ends_mid_line(&mut file).await? {
            warn!(path = %path.display(), "session log ends in a torn record; starting a new line");
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, record).context("failed serializing session record")?;
        line.push(b'\n');

        // The record and its newline go out in a single write.
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Rebuild a session by replaying its log. `None` when no log exists.
    ///
    /// A record cut short by an interrupted write is skipped.
    async fn replay(path: &Path) -> Result<Option<Session>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let file = OpenOptions::new().read(true).open(path).await?;
        let mut reader = BufReader::new(file).lines();
        let mut session: Option<Session> = None;

        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: SessionRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(error) if error.is_eof() => {
                    warn!(path = %path.display(), %error, "skipping torn session record");
                    continue;
                }
                Err(error) => {
                    return Err(error)
                        .with_context(|| format!("failed parsing session record in {path:?}"));
                }
            };
            match record {
                SessionRecord::Created {
                    session_id,
                    app_name,
                    user_id,
                    created_at,
                } => {
                    let mut created = Session::new(session_id, app_name, user_id);
                    created.last_update_time = created_at;
                    session = Some(created);
                }
                SessionRecord::Appended { event } => {
                    let Some(session) = session.as_mut() else {
                        bail!("session log {path:?} has events before its created record");
                    };
                    session.apply(event);
                }
            }
        }
        Ok(session)
    }

    /// Start a new log. `None` when a log already exists for `session_id`.
    #[instrument(skip(self))]
    async fn create(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<Option<Session>> {
        let path = self.file_path(app_name, user_id, session_id)?;
        Self::ensure_parent(&path).await?;

        let _lock = self.lock_log(&path).await;

        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let session = Session::new(session_id.clone(), app_name, user_id);
        Self::append_record(
            &path,
            &SessionRecord::Created {
                session_id: session.id.clone(),
                app_name: session.app_name.clone(),
                user_id: session.user_id.clone(),
                created_at: session.last_update_time,
            },
        )
        .await?;
        debug!("session log created");
        Ok(Some(session))
    }

    #[instrument(skip(self, session, event), fields(session_id = %session.id, event_id = %event.id))]
    async fn append(&self, session: &Session, event: &SessionEvent) -> Result<()> {
        let path = self.file_path(&session.app_name, &session.user_id, &session.id)?;
        let _lock = self.lock_log(&path).await;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            bail!("session log missing for {}", session.id);
        }
        Self::append_record(
            &path,
            &SessionRecord::Appended {
                event: event.clone(),
            },
        )
        .await?;
        debug!("event appended to session log");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<SessionId>,
    ) -> BridgeResult<Session> {
        let session_id = session_id.unwrap_or_default();
        self.create(app_name, user_id, &session_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| BridgeError::SessionExists(session_id.to_string()))
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> BridgeResult<Option<Session>> {
        let path = self
            .file_path(app_name, user_id, session_id)
            .map_err(store_error)?;
        Self::replay(&path).await.map_err(store_error)
    }

    async fn append_event(
        &self,
        session: &Session,
        event: SessionEvent,
    ) -> BridgeResult<SessionEvent> {
        self.append(session, &event).await.map_err(store_error)?;
        Ok(event)
    }
}

fn store_error(error: anyhow::Error) -> BridgeError {
    BridgeError::Persistence(format!("{error:#}"))
}

/// Whether the log's last byte is something other than a newline.
async fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

/// Reject identifiers that would escape their directory.
fn checked_segment(segment: &str) -> Result<&str> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
        || segment.contains('\0')
    {
        bail!("invalid path segment: {segment:?}");
    }
    Ok(segment)
}
