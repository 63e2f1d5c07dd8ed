//! 对局会话
//!
//! 每个对局 ID 一个 actor 任务，独占权威 [`GameState`]。所有回合经同一个
//! 有序队列串行处理：校验、落子、提子在同步代码里一次完成，之后才持久化
//! 和广播。订阅者只收到快照副本。
//!
//! 没有订阅者的会话空闲一段时间后自行退出，之后同一 ID 由注册表从存储重新加载。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use protocol::{resolve_turn, GameState, ServerMessage, Turn};

use crate::storage::StorageManager;

/// 连接 ID
pub type ConnId = u64;

/// 会话错误
#[derive(Error, Debug)]
pub enum SessionError {
    /// 会话任务已退出
    #[error("Session {0} is closed")]
    Closed(String),

    /// 订阅者的发送队列已满，未能收到初始快照
    #[error("Outbox is full, cannot join session {0}")]
    OutboxFull(String),
}

/// 发给会话 actor 的命令
#[derive(Debug)]
pub enum SessionCommand {
    /// 订阅快照广播，成功后立即收到 `Joined`
    Subscribe {
        conn_id: ConnId,
        outbox: mpsc::Sender<ServerMessage>,
        /// 是否已订阅
        reply: oneshot::Sender<bool>,
    },
    /// 取消订阅
    Unsubscribe { conn_id: ConnId },
    /// 提交回合
    Turn { conn_id: ConnId, turn: Turn },
    /// 新开一局
    NewGame { conn_id: ConnId },
    /// 读取当前快照
    Snapshot { reply: oneshot::Sender<GameState> },
}

/// 会话句柄，可廉价克隆
#[derive(Debug, Clone)]
pub struct SessionHandle {
    game_id: String,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// 会话任务是否已退出
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Closed(self.game_id.clone()))
    }

    /// 订阅；返回时 `Joined` 已进入 outbox
    pub async fn subscribe(
        &self,
        conn_id: ConnId,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe {
            conn_id,
            outbox,
            reply,
        })
        .await?;
        match rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SessionError::OutboxFull(self.game_id.clone())),
            Err(_) => Err(SessionError::Closed(self.game_id.clone())),
        }
    }

    pub async fn unsubscribe(&self, conn_id: ConnId) -> Result<(), SessionError> {
        self.send(SessionCommand::Unsubscribe { conn_id }).await
    }

    /// 提交回合，结果通过订阅者的 outbox 返回
    pub async fn submit(&self, conn_id: ConnId, turn: Turn) -> Result<(), SessionError> {
        self.send(SessionCommand::Turn { conn_id, turn }).await
    }

    pub async fn new_game(&self, conn_id: ConnId) -> Result<(), SessionError> {
        self.send(SessionCommand::NewGame { conn_id }).await
    }

    /// 当前快照的副本
    pub async fn snapshot(&self) -> Result<GameState, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed(self.game_id.clone()))
    }
}

/// 启动会话 actor
///
/// 没有订阅者且 `idle_timeout` 内没有任何命令时，任务退出。
pub fn spawn(
    state: GameState,
    storage: Arc<StorageManager>,
    capacity: usize,
    idle_timeout: Duration,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let game_id = state.id.clone();

    let session = Session {
        state,
        subscribers: HashMap::new(),
        storage,
        idle_timeout,
    };
    tokio::spawn(session.run(rx));
    info!("会话 {} 已启动", game_id);

    SessionHandle { game_id, tx }
}

/// 会话 actor 的私有状态
struct Session {
    state: GameState,
    subscribers: HashMap<ConnId, mpsc::Sender<ServerMessage>>,
    storage: Arc<StorageManager>,
    idle_timeout: Duration,
}

impl Session {
    /// 下一条命令；无人订阅且空闲超时返回 None
    async fn next_command(
        &mut self,
        rx: &mut mpsc::Receiver<SessionCommand>,
    ) -> Option<SessionCommand> {
        // 连接断开而没来得及取消订阅的也算离开
        self.subscribers.retain(|_, outbox| !outbox.is_closed());
        if !self.subscribers.is_empty() {
            return rx.recv().await;
        }
        match timeout(self.idle_timeout, rx.recv()).await {
            Ok(cmd) => cmd,
            Err(_) => {
                info!("会话 {} 无人订阅，空闲退出", self.state.id);
                None
            }
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        while let Some(cmd) = self.next_command(&mut rx).await {
            match cmd {
                SessionCommand::Subscribe {
                    conn_id,
                    outbox,
                    reply,
                } => {
                    let joined = ServerMessage::Joined {
                        game: self.state.clone(),
                    };
                    let subscribed = outbox.try_send(joined).is_ok();
                    if subscribed {
                        self.subscribers.insert(conn_id, outbox);
                        debug!("连接 {} 订阅了 {}", conn_id, self.state.id);
                    } else {
                        warn!("连接 {} 发送队列不可用，无法订阅 {}", conn_id, self.state.id);
                    }
                    let _ = reply.send(subscribed);
                }
                SessionCommand::Unsubscribe { conn_id } => {
                    if self.subscribers.remove(&conn_id).is_some() {
                        debug!("连接 {} 离开了 {}", conn_id, self.state.id);
                    }
                }
                SessionCommand::Turn { conn_id, turn } => self.handle_turn(conn_id, turn).await,
                SessionCommand::NewGame { conn_id } => {
                    info!("连接 {} 在 {} 新开一局", conn_id, self.state.id);
                    let next = self.state.new_game();
                    self.commit(next).await;
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.state.clone());
                }
            }
        }
        info!("会话 {} 已结束", self.state.id);
    }

    async fn handle_turn(&mut self, conn_id: ConnId, turn: Turn) {
        match resolve_turn(&turn, &self.state) {
            Ok(resolution) => {
                info!(
                    "{} 接受回合: {} {} {:?} {}",
                    self.state.id, turn.player, turn.color, turn.kind, turn.point
                );
                if !resolution.captured.is_empty() {
                    info!("{} 提子 {} 颗", self.state.id, resolution.captured.len());
                }
                if let Some(board_temp) = &turn.board_temp {
                    let diff = board_temp.diff_count(&self.state.board);
                    if diff > 0 {
                        debug!("{} 客户端棋盘与权威棋盘有 {} 处不同", self.state.id, diff);
                    }
                }
                self.commit(resolution.state).await;
            }
            Err(e) => {
                warn!("{} 拒绝回合 ({}): {}", self.state.id, turn.player, e);
                let rejected = ServerMessage::TurnRejected {
                    code: e.code(),
                    message: e.to_string(),
                };
                match self.subscribers.get(&conn_id) {
                    Some(outbox) => {
                        if let Err(e) = outbox.try_send(rejected) {
                            warn!("{} 无法通知连接 {} 回合被拒绝: {}", self.state.id, conn_id, e);
                        }
                    }
                    None => warn!("{} 连接 {} 未订阅，丢弃拒绝通知", self.state.id, conn_id),
                }
            }
        }
    }

    /// 替换权威快照，持久化后广播
    ///
    /// 写盘失败只记录错误，仍然广播新快照。
    async fn commit(&mut self, next: GameState) {
        self.state = next;

        let storage = Arc::clone(&self.storage);
        let snapshot = self.state.clone();
        match tokio::task::spawn_blocking(move || storage.save_game(&snapshot)).await {
            Ok(Ok(path)) => debug!("{} 已保存到 {:?}", self.state.id, path),
            Ok(Err(e)) => error!("{} 保存失败: {:#}", self.state.id, e),
            Err(e) => error!("{} 保存任务失败: {}", self.state.id, e),
        }

        self.broadcast(ServerMessage::GameUpdate {
            game: self.state.clone(),
        });
    }

    fn broadcast(&mut self, msg: ServerMessage) {
        let game_id = &self.state.id;
        self.subscribers.retain(|conn_id, outbox| match outbox.try_send(msg.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("{} 连接 {} 发送队列已满，丢弃一次更新", game_id, conn_id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("{} 移除已断开的连接 {}", game_id, conn_id);
                false
            }
        });
    }
}
