//! 会话注册表：对局 ID -> 会话句柄
//!
//! 每个 ID 至多一个存活的会话，不同对局互不共享队列。空闲退出的会话在下次查找时移除。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::session::{self, SessionHandle};
use crate::storage::StorageManager;

/// 会话注册表
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    storage: Arc<StorageManager>,
    capacity: usize,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(storage: Arc<StorageManager>, capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            storage,
            capacity,
            idle_timeout,
        }
    }

    /// 获取会话，不存在或已退出时从存储加载并启动
    pub async fn get_or_spawn(&self, game_id: &str) -> Result<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, handle| !handle.is_closed());
        if let Some(handle) = sessions.get(game_id) {
            return Ok(handle.clone());
        }

        let storage = Arc::clone(&self.storage);
        let id = game_id.to_string();
        let state = tokio::task::spawn_blocking(move || storage.load_or_template(&id))
            .await
            .context("加载对局任务失败")?;

        let handle = session::spawn(
            state,
            Arc::clone(&self.storage),
            self.capacity,
            self.idle_timeout,
        );
        sessions.insert(game_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// 获取仍在运行的会话
    pub async fn get(&self, game_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .await
            .get(game_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// 当前运行中的会话数量
    pub async fn count(&self) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }
}
