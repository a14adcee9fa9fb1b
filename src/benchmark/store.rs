//! 压测记录存储
//!
//! `BenchmarkStore` 为同步存储接口（内存或 SQLite），
//! `RecordStore` 为异步封装，在阻塞线程池中执行存储操作。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use super::error::StoreError;
use super::model::{BenchmarkRecord, NewBenchmarkRecord, RecordPatch};

/// 记录存储接口
///
/// 实现必须保证：
/// - id 单调递增，删除后也不复用
/// - create/update/delete 相互线性化，读取不会看到构造到一半的记录
pub trait BenchmarkStore: Send + Sync {
    /// 分配 id 与创建时间并保存
    fn create(&self, new: NewBenchmarkRecord) -> Result<BenchmarkRecord, StoreError>;

    fn get(&self, id: u64) -> Result<BenchmarkRecord, StoreError>;

    /// 全部记录，顺序不保证
    fn list(&self) -> Result<Vec<BenchmarkRecord>, StoreError>;

    /// 部分更新 notes/favorite
    fn update(&self, id: u64, patch: RecordPatch) -> Result<BenchmarkRecord, StoreError>;

    /// 不可恢复的物理删除
    fn delete(&self, id: u64) -> Result<(), StoreError>;

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list()?.len())
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    /// 已分配的最大 id
    last_id: u64,
    records: BTreeMap<u64, BenchmarkRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BenchmarkStore for MemoryStore {
    fn create(&self, new: NewBenchmarkRecord) -> Result<BenchmarkRecord, StoreError> {
        // id 分配与插入在同一把写锁内完成
        let mut inner = self.inner.write();
        inner.last_id += 1;
        let id = inner.last_id;
        let record = new.into_record(id, Utc::now());
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: u64) -> Result<BenchmarkRecord, StoreError> {
        self.inner
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<BenchmarkRecord>, StoreError> {
        Ok(self.inner.read().records.values().cloned().collect())
    }

    fn update(&self, id: u64, patch: RecordPatch) -> Result<BenchmarkRecord, StoreError> {
        let mut inner = self.inner.write();
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply(record);
        Ok(record.clone())
    }

    fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.inner
            .write()
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().records.len())
    }
}

/// 异步存储句柄（可克隆，共享同一后端）
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn BenchmarkStore>,
}

impl RecordStore {
    pub fn new(backend: impl BenchmarkStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// 使用内存后端创建
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub async fn create(&self, new: NewBenchmarkRecord) -> Result<BenchmarkRecord, StoreError> {
        let record = self.run(move |store| store.create(new)).await?;
        tracing::info!(
            id = record.id,
            model = record.model_key(),
            status = %record.status,
            "压测记录已创建"
        );
        Ok(record)
    }

    pub async fn get(&self, id: u64) -> Result<BenchmarkRecord, StoreError> {
        self.run(move |store| store.get(id)).await
    }

    pub async fn list(&self) -> Result<Vec<BenchmarkRecord>, StoreError> {
        self.run(|store| store.list()).await
    }

    pub async fn update(
        &self,
        id: u64,
        patch: RecordPatch,
    ) -> Result<BenchmarkRecord, StoreError> {
        let record = self.run(move |store| store.update(id, patch)).await?;
        tracing::info!(id, favorite = record.favorite, "压测记录已更新");
        Ok(record)
    }

    pub async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.run(move |store| store.delete(id)).await?;
        tracing::info!(id, "压测记录已删除");
        Ok(())
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.run(|store| store.count()).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn BenchmarkStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || f(backend.as_ref()))
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("存储任务执行失败: {}", e)))?
    }
}
