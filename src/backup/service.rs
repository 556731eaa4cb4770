//! Backup service: create, download, restore and list database backups.

use super::integrity::{copy_with_digest, file_digest};
use super::naming::{safety_copy_name, BackupName};
use super::BackupError;
use crate::config::Config;
use crate::db::{check_database_file, Repository};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Upper bound on backups (or safety copies) named within one second.
const MAX_SAME_SECOND: u32 = 10_000;

/// Where the live database and its backups live.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub database_path: PathBuf,
    pub backup_dir: PathBuf,
    pub prefix: String,
    pub download_url_prefix: String,
}

impl From<&Config> for BackupSettings {
    fn from(config: &Config) -> Self {
        Self {
            database_path: config.database_path.clone(),
            backup_dir: config.backup_dir.clone(),
            prefix: config.backup_prefix.clone(),
            download_url_prefix: config.download_url_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedBackup {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Base name of the safety copy, `None` if there was no live database.
    pub safety_copy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub filename: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStatus {
    pub database: Option<DatabaseInfo>,
    /// Newest first.
    pub backups: Vec<BackupFile>,
}

/// Backup operations over one live database file.
///
/// Create and restore are serialized. When a repository is attached,
/// backups are taken under the SQLite write lock and restores close the
/// repository's pool while the file is swapped.
pub struct BackupService {
    settings: BackupSettings,
    repo: Option<Arc<Repository>>,
    lock: Mutex<()>,
}

impl BackupService {
    pub fn new(settings: BackupSettings) -> Self {
        Self {
            settings,
            repo: None,
            lock: Mutex::new(()),
        }
    }

    /// Coordinate file operations with the repository open on the live database.
    pub fn with_repository(mut self, repo: Arc<Repository>) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Copy the live database into a new timestamped backup file.
    ///
    /// # Errors
    /// `DatabaseNotFound` if the live database file does not exist.
    pub async fn create_backup(&self) -> Result<CreatedBackup, BackupError> {
        let _guard = self.lock.lock().await;

        let db_path = &self.settings.database_path;
        if !is_file(db_path).await? {
            return Err(BackupError::DatabaseNotFound(db_path.clone()));
        }
        fs::create_dir_all(&self.settings.backup_dir).await?;

        let now = Utc::now().naive_utc();
        let created = match &self.repo {
            Some(repo) => repo.with_write_lock(|| self.copy_to_new_backup(now)).await?,
            None => self.copy_to_new_backup(now).await?,
        };

        info!(
            filename = %created.filename,
            size = created.size,
            checksum = %created.checksum,
            "Backup created"
        );
        Ok(created)
    }

    /// Read a backup file for download.
    ///
    /// # Errors
    /// `MissingFilename`/`InvalidFilename` if `filename` is not a backup
    /// name, `BackupNotFound` if no such backup exists.
    pub async fn download_backup(&self, filename: &str) -> Result<BackupDownload, BackupError> {
        let name = self.parse_name(filename)?;
        let path = self.settings.backup_dir.join(name.file_name());

        match fs::read(&path).await {
            Ok(bytes) => Ok(BackupDownload {
                filename: name.file_name(),
                bytes,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BackupError::BackupNotFound(name.file_name()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the live database with a backup.
    ///
    /// The live file is first copied aside as a safety copy. The backup is
    /// then staged next to the live file, synced, verified and renamed over
    /// it, so the live path always holds a complete database. With a
    /// repository attached the staged file must also pass SQLite's
    /// `quick_check` before the rename.
    ///
    /// # Errors
    /// `MissingFilename`/`InvalidFilename` before anything is touched,
    /// `BackupNotFound` if the backup does not exist, `ChecksumMismatch` or
    /// `InvalidBackup` if the staged copy is rejected. The live file is
    /// untouched in all of these cases.
    pub async fn restore_backup(&self, filename: &str) -> Result<RestoreOutcome, BackupError> {
        let name = self.parse_name(filename)?;
        let _guard = self.lock.lock().await;

        let backup_path = self.settings.backup_dir.join(name.file_name());
        if !is_file(&backup_path).await? {
            return Err(BackupError::BackupNotFound(name.file_name()));
        }

        let expected = file_digest(&backup_path).await?;
        let outcome = match &self.repo {
            Some(repo) => {
                repo.replace_database_file(|| self.swap_in(&backup_path, &expected))
                    .await?
            }
            None => self.swap_in(&backup_path, &expected).await?,
        };

        info!(
            backup = %name.file_name(),
            safety_copy = outcome.safety_copy.as_deref().unwrap_or("-"),
            "Database restored from backup"
        );
        Ok(outcome)
    }

    /// List backups (newest first) and describe the live database.
    pub async fn status(&self) -> Result<BackupStatus, BackupError> {
        let mut found: Vec<(BackupName, BackupFile)> = Vec::new();

        match fs::read_dir(&self.settings.backup_dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let file_name = entry.file_name();
                    let Some(file_name) = file_name.to_str() else {
                        continue;
                    };
                    let Some(name) = BackupName::parse(&self.settings.prefix, file_name) else {
                        continue;
                    };
                    let metadata = match entry.metadata().await {
                        Ok(m) => m,
                        // Removed between listing and stat.
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    };
                    if !metadata.is_file() {
                        continue;
                    }
                    let created = metadata.created().or_else(|_| metadata.modified())?;

                    found.push((
                        name,
                        BackupFile {
                            filename: file_name.to_string(),
                            size: metadata.len(),
                            created: created.into(),
                            download_url: self.download_url(file_name),
                        },
                    ));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        found.sort_by(|(a_name, a), (b_name, b)| {
            b.created
                .cmp(&a.created)
                .then_with(|| b_name.cmp(a_name))
        });

        let db_path = &self.settings.database_path;
        let database = match fs::metadata(db_path).await {
            Ok(m) if m.is_file() => Some(DatabaseInfo {
                size: m.len(),
                modified: m.modified()?.into(),
                path: db_path.clone(),
            }),
            Ok(_) => None,
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(BackupStatus {
            database,
            backups: found.into_iter().map(|(_, file)| file).collect(),
        })
    }

    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/{}", self.settings.download_url_prefix, filename)
    }

    fn parse_name(&self, filename: &str) -> Result<BackupName, BackupError> {
        if filename.trim().is_empty() {
            return Err(BackupError::MissingFilename);
        }
        BackupName::parse(&self.settings.prefix, filename)
            .ok_or_else(|| BackupError::InvalidFilename(filename.to_string()))
    }

    async fn copy_to_new_backup(&self, now: NaiveDateTime) -> Result<CreatedBackup, BackupError> {
        let db_path = &self.settings.database_path;
        let mut source = match File::open(db_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackupError::DatabaseNotFound(db_path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let prefix = &self.settings.prefix;
        let (filename, path, mut dest) = create_unique(&self.settings.backup_dir, |counter| {
            BackupName::new(prefix, now, counter).file_name()
        })
        .await?;

        let copied = async {
            let (size, checksum) = copy_with_digest(&mut source, &mut dest).await?;
            dest.sync_all().await?;
            Ok::<_, std::io::Error>((size, checksum))
        }
        .await;

        match copied {
            Ok((size, checksum)) => Ok(CreatedBackup {
                filename,
                path,
                size,
                checksum,
            }),
            Err(e) => {
                discard(&path).await;
                Err(e.into())
            }
        }
    }

    /// Install `backup_path` as the live database; `expected` is the
    /// backup's digest taken before staging.
    async fn swap_in(
        &self,
        backup_path: &Path,
        expected: &str,
    ) -> Result<RestoreOutcome, BackupError> {
        let db_path = &self.settings.database_path;
        let db_dir = parent_dir(db_path);
        let db_file_name = db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(ErrorKind::InvalidInput, "database path has no file name")
            })?;
        fs::create_dir_all(&db_dir).await?;

        let safety_copy = if is_file(db_path).await? {
            let now = Utc::now().naive_utc();
            let (name, path, mut dest) = create_unique(&db_dir, |counter| {
                safety_copy_name(&db_file_name, now, counter)
            })
            .await?;

            let copied = async {
                let mut live = File::open(db_path).await?;
                copy_with_digest(&mut live, &mut dest).await?;
                dest.sync_all().await
            }
            .await;
            if let Err(e) = copied {
                discard(&path).await;
                return Err(e.into());
            }
            info!(safety_copy = %name, "Safety copy of live database written");
            Some(name)
        } else {
            None
        };

        let staging = db_dir.join(format!(
            ".{}.restore-{}",
            db_file_name,
            Uuid::new_v4().simple()
        ));
        if let Err(e) = self.stage(backup_path, &staging, expected).await {
            discard(&staging).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, db_path).await {
            discard(&staging).await;
            return Err(e.into());
        }
        sync_dir(&db_dir).await;

        Ok(RestoreOutcome { safety_copy })
    }

    /// Copy `source` to a new file at `staging`, sync it and check that the
    /// bytes on disk hash to `expected`.
    async fn stage(
        &self,
        source: &Path,
        staging: &Path,
        expected: &str,
    ) -> Result<(), BackupError> {
        let mut src = File::open(source).await?;
        let mut dest = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging)
            .await?;
        copy_with_digest(&mut src, &mut dest).await?;
        dest.sync_all().await?;
        drop(dest);

        verify_copy(staging, expected).await?;

        if self.repo.is_some() {
            check_database_file(staging)
                .await
                .map_err(|e| BackupError::InvalidBackup {
                    path: source.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

async fn verify_copy(path: &Path, expected: &str) -> Result<(), BackupError> {
    let actual = file_digest(path).await?;
    if actual != expected {
        return Err(BackupError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Create a new file in `dir` under the first free name produced by
/// `name_for(None)`, `name_for(Some(2))`, `name_for(Some(3))`, ...
///
/// Names are claimed with create-new semantics, so concurrent callers never
/// share a file.
async fn create_unique<F>(dir: &Path, name_for: F) -> std::io::Result<(String, PathBuf, File)>
where
    F: Fn(Option<u32>) -> String,
{
    for n in 1..=MAX_SAME_SECOND {
        let name = name_for((n > 1).then_some(n));
        let path = dir.join(&name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((name, path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name in {}", dir.display()),
    ))
}

async fn is_file(path: &Path) -> std::io::Result<bool> {
    match fs::metadata(path).await {
        Ok(m) => Ok(m.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) {
    let synced = async { File::open(dir).await?.sync_all().await }.await;
    if let Err(e) = synced {
        warn!(dir = %dir.display(), error = %e, "Failed to sync directory after rename");
    }
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) {}
