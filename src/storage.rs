//! 認証情報・設定・表示状態の保存先
//!
//! どれも「1キー1値」の get / put / clear だけを要求する。

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ScraperError;

#[async_trait]
pub trait Store<T: Send + Sync>: Send + Sync {
    async fn get(&self) -> Result<Option<T>, ScraperError>;

    async fn put(&self, value: &T) -> Result<(), ScraperError>;

    async fn clear(&self) -> Result<(), ScraperError>;
}

/// プロセス内だけで保持するストア
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    slot: Mutex<Option<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        // 保持しているのは単なる値なので、毒化していても中身は使える
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<T> Store<T> for MemoryStore<T>
where
    T: Clone + Send + Sync,
{
    async fn get(&self) -> Result<Option<T>, ScraperError> {
        Ok(self.lock().clone())
    }

    async fn put(&self, value: &T) -> Result<(), ScraperError> {
        *self.lock() = Some(value.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ScraperError> {
        *self.lock() = None;
        Ok(())
    }
}

/// JSONファイル1つに保存するストア
///
/// 壊れたJSONは警告を出して「値なし」として扱う。
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T> Store<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self) -> Result<Option<T>, ScraperError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("保存済みJSONの解析に失敗 {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    async fn put(&self, value: &T) -> Result<(), ScraperError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("保存完了: {:?}", self.path);
        Ok(())
    }

    async fn clear(&self) -> Result<(), ScraperError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
