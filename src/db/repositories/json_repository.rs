// src/db/repositories/json_repository.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::user_repository::{sort_users, UserRepository};
use crate::db::StoreError;
use crate::models::{normalize_username, UserId, UserProfile};

/// User store keeping one pretty-printed JSON document per user.
///
/// Writes go through a mutex so the username uniqueness check and the
/// insert happen as one step within this process.
pub struct JsonUserRepository {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonUserRepository {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!("Opened JSON user store at {}", dir.display());

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, id: UserId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_user(path: &Path) -> Result<UserProfile, StoreError> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        let path = self.path_for(user.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(user)?;

        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Every readable user record; unreadable files are skipped with a warning
    async fn load_all(&self) -> Result<Vec<UserProfile>, StoreError> {
        let mut users = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Self::read_user(&path).await {
                Ok(user) => users.push(user),
                Err(e) => warn!("Skipping unreadable user record {}: {}", path.display(), e),
            }
        }

        Ok(users)
    }
}

#[async_trait]
impl UserRepository for JsonUserRepository {
    async fn create(&self, user: &UserProfile) -> Result<UserProfile, StoreError> {
        let _guard = self.write_lock.lock().await;

        let key = user.username_key();
        if self.load_all().await?.iter().any(|existing| existing.username_key() == key) {
            return Err(StoreError::UsernameTaken(user.username.clone()));
        }

        self.write_user(user).await?;
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        match Self::read_user(&self.path_for(id)).await {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        let key = normalize_username(username);
        Ok(self.load_all().await?.into_iter().find(|user| user.username_key() == key))
    }

    async fn list(&self) -> Result<Vec<UserProfile>, StoreError> {
        let mut users = self.load_all().await?;
        sort_users(&mut users);
        Ok(users)
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut user = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        user.last_login = Some(at);
        self.write_user(&user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user_repository::tests::sample_user;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("keystroke-auth-test-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = temp_dir();
        let repo = JsonUserRepository::open(&dir).await.unwrap();
        let user = sample_user("Dana");
        repo.create(&user).await.unwrap();

        // A second handle over the same directory sees the record
        let reopened = JsonUserRepository::open(&dir).await.unwrap();
        assert_eq!(reopened.find_by_id(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(reopened.find_by_username("dana").await.unwrap(), Some(user.clone()));
        assert!(matches!(
            reopened.create(&sample_user("DANA")).await,
            Err(StoreError::UsernameTaken(_))
        ));

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_delete_and_login() {
        let dir = temp_dir();
        let repo = JsonUserRepository::open(&dir).await.unwrap();
        let first = sample_user("erin");
        let second = sample_user("frank");
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();

        // Stray files are ignored
        fs::write(dir.join("notes.txt"), b"hello").await.unwrap();
        fs::write(dir.join("broken.json"), b"{").await.unwrap();

        let users = repo.list().await.unwrap();
        assert_eq!(users.len(), 2);

        let now = Utc::now();
        repo.record_login(first.id, now).await.unwrap();
        assert_eq!(repo.find_by_id(first.id).await.unwrap().unwrap().last_login, Some(now));

        repo.delete(second.id).await.unwrap();
        assert!(repo.find_by_id(second.id).await.unwrap().is_none());
        assert!(matches!(repo.delete(second.id).await, Err(StoreError::NotFound(_))));

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
