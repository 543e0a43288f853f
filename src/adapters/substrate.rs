use crate::domain::ports::KeyValueSubstrate;
use crate::utils::error::{Result, StoreError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 以 HashMap 保存的鍵值儲存，程序結束即消失
#[derive(Debug, Clone, Default)]
pub struct MemorySubstrate {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueSubstrate for MemorySubstrate {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.keys().cloned().collect())
    }
}

/// 每個 key 對應 `<base_path>/<key>.json` 一個檔案
#[derive(Debug, Clone)]
pub struct FileSubstrate {
    base_path: PathBuf,
}

impl FileSubstrate {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(|c| c == '/' || c == '\\') || key.starts_with('.') {
            return Err(StoreError::bad_request(format!(
                "Invalid storage key: {}",
                key
            )));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl KeyValueSubstrate for FileSubstrate {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::IoError(e)),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.base_path).await?;

        // 先寫暫存檔再改名，避免留下寫到一半的表
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::IoError(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::IoError(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(key) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
