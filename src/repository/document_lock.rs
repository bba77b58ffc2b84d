// ==========================================
// 库存对账回填系统 - 文档锁
// ==========================================
// 一个逻辑文档库对应一把锁;读-改-写全过程持有租约
// 租约为拥有型守卫,可移入后台线程,任何退出路径上随 Drop 释放
// ==========================================

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// 计划表文档库（克隆后共享同一把锁）
#[derive(Debug, Clone)]
pub struct PlanDocumentStore {
    id: Uuid,
    name: String,
    lock: Arc<Mutex<()>>,
}

impl PlanDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 阻塞获取租约（不可在异步上下文中调用）
    pub fn acquire(&self) -> DocumentLease {
        let guard = self.lock.clone().blocking_lock_owned();
        self.lease(guard)
    }

    /// 异步获取租约
    pub async fn acquire_async(&self) -> DocumentLease {
        let guard = self.lock.clone().lock_owned().await;
        self.lease(guard)
    }

    /// 立即尝试获取租约
    pub fn try_acquire(&self) -> Option<DocumentLease> {
        self.lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| self.lease(guard))
    }

    fn lease(&self, guard: OwnedMutexGuard<()>) -> DocumentLease {
        debug!(store = %self.name, "获取文档锁");
        DocumentLease {
            store_id: self.id,
            store_name: self.name.clone(),
            _guard: guard,
        }
    }
}

/// 文档租约: 持有期间独占该文档库
#[derive(Debug)]
pub struct DocumentLease {
    store_id: Uuid,
    store_name: String,
    _guard: OwnedMutexGuard<()>,
}

impl DocumentLease {
    /// 是否属于指定文档库
    pub fn belongs_to(&self, store: &PlanDocumentStore) -> bool {
        self.store_id == store.id
    }
}

impl Drop for DocumentLease {
    fn drop(&mut self) {
        debug!(store = %self.store_name, "释放文档锁");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_is_exclusive_and_released_on_drop() {
        let store = PlanDocumentStore::new("plan");
        let lease = store.acquire();
        assert!(lease.belongs_to(&store));
        assert!(store.try_acquire().is_none());
        drop(lease);
        assert!(store.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_one_lock() {
        let store = PlanDocumentStore::new("plan");
        let other = store.clone();
        let _lease = store.acquire();
        assert!(other.try_acquire().is_none());
        assert!(!PlanDocumentStore::new("x").acquire().belongs_to(&store));
    }

    #[tokio::test]
    async fn test_async_acquire_waits_for_release() {
        let store = PlanDocumentStore::new("plan");
        let lease = store.acquire_async().await;
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.acquire_async().await.belongs_to(&store) })
        };
        drop(lease);
        assert!(waiter.await.unwrap());
    }
}
