use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::RwLock,
};
use tracing::debug;

/// Interface for abstracting the key-value persistence everything in dailystreak is kept in.
/// Values are whole documents, they are always read and rewritten fully.
pub trait KeyValueStore {
    /// Returns `None` for keys that were never written or were removed.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        self.deref().get(key)
    }

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send {
        self.deref().set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        self.deref().remove(key)
    }
}

/// The main realization of [KeyValueStore]. Every key is a separate file in `store_dir`, locked
/// while it's read or written so the cli and the daemon never see half written values.
///
/// File locks block the calling thread. Tasks of one process therefore queue on `access` first,
/// and the file lock is only ever contended by another process.
pub struct FileStore {
    store_dir: PathBuf,
    access: RwLock<()>,
}

impl FileStore {
    pub fn new(store_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&store_dir)?;

        Ok(Self {
            store_dir,
            access: RwLock::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.store_dir.join(format!("{key}.json"))
    }

    async fn read_locked(path: &Path) -> Result<String, std::io::Error> {
        debug!("Reading {path:?}");
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut value = String::new();
        let result = file.read_to_string(&mut value).await;
        file.unlock_async().await?;
        result.map(|_| value)
    }

    async fn overwrite(file: &mut File, value: &[u8]) -> Result<()> {
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(value).await?;
        file.flush().await?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _access = self.access.read().await;
        match Self::read_locked(&self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)?,
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        let _access = self.access.write().await;
        debug!("Writing {path:?}");
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::overwrite(&mut file, value.as_bytes()).await;
        file.unlock_async().await?;
        result
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _access = self.access.write().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{mpsc, Arc},
        time::Duration,
    };

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::utils::runtime::single_thread_runtime;

    use super::{FileStore, KeyValueStore};

    #[tokio::test]
    async fn missing_key_reads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;
        assert_eq!(store.get("habits").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn shorter_value_replaces_longer_one() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("store"))?;
        store.set("habits", "[1, 2, 3, 4, 5]".into()).await?;
        store.set("habits", "[]".into()).await?;
        assert_eq!(store.get("habits").await?.as_deref(), Some("[]"));
        Ok(())
    }

    /// Readers and writers of one key interleave on the single daemon thread without stalling.
    #[test]
    fn concurrent_access_to_one_key_on_one_thread() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(FileStore::new(dir.path().to_owned())?);
        let (done, finished) = mpsc::channel();

        std::thread::spawn(move || {
            let result = single_thread_runtime().and_then(|runtime| {
                runtime.block_on(async move {
                    for i in 0..200 {
                        let reader = tokio::spawn({
                            let store = store.clone();
                            async move { store.get("reminder-1").await }
                        });
                        let writer = tokio::spawn({
                            let store = store.clone();
                            async move { store.set("reminder-1", format!("{i}")).await }
                        });
                        reader.await??;
                        writer.await??;
                    }
                    store.get("reminder-1").await
                })
            });
            let _ = done.send(result);
        });

        let last = finished.recv_timeout(Duration::from_secs(10))??;
        assert_eq!(last.as_deref(), Some("199"));
        Ok(())
    }

    #[tokio::test]
    async fn remove_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(FileStore::new(dir.path().to_owned())?);
        store.set("lastProgressUpdate-1", "50".into()).await?;
        store.remove("lastProgressUpdate-1").await?;
        store.remove("lastProgressUpdate-1").await?;
        assert_eq!(store.get("lastProgressUpdate-1").await?, None);
        Ok(())
    }
}
