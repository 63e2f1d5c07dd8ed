//! 服务器主逻辑
//!
//! 每个连接一个读循环和一个写任务。写任务只消费该连接的 outbox，
//! 会话广播和直接回复都经由它发出，因此同一连接上的消息保持有序。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use protocol::{
    ClientMessage, Connection, ErrorCode, Listener, MoveError, ProtocolError, ServerMessage,
    TcpConnection, TcpListener, Turn,
};

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;
use crate::session::{ConnId, SessionError, SessionHandle};
use crate::storage::StorageManager;

/// 每个连接的发送队列容量
const OUTBOX_CAPACITY: usize = 64;

/// 服务器状态
pub struct ServerState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    next_conn_id: AtomicU64,
    active: AtomicUsize,
}

impl ServerState {
    pub fn new(config: ServerConfig, storage: Arc<StorageManager>) -> Self {
        let sessions = SessionRegistry::new(
            storage,
            config.session_queue_capacity,
            config.session_idle_timeout(),
        );
        Self {
            config,
            sessions,
            next_conn_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
        }
    }

    /// 当前连接数
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// 连接计数守卫，连接结束时归还名额
struct ActiveGuard(Arc<ServerState>);

impl ActiveGuard {
    fn acquire(state: &Arc<ServerState>) -> Option<Self> {
        let max = state.config.max_connections;
        state
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(state)))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 服务器
pub struct Server {
    state: Arc<ServerState>,
}

impl Server {
    /// 按配置创建（包括存储目录）
    pub fn new(config: ServerConfig) -> Result<Self> {
        let storage = StorageManager::from_config(&config)?;
        info!("快照目录: {:?}", storage.saves_directory());
        Ok(Self::with_storage(config, Arc::new(storage)))
    }

    pub fn with_storage(config: ServerConfig, storage: Arc<StorageManager>) -> Self {
        Self {
            state: Arc::new(ServerState::new(config, storage)),
        }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// 绑定配置中的监听地址
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.state.config.network.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;
        Ok(listener.with_format(self.state.config.network.wire_format))
    }

    /// 接受连接直到出错退出
    pub async fn run(&self, mut listener: TcpListener) -> Result<()> {
        info!(
            "服务器监听于 {}",
            listener.local_addr().unwrap_or_else(|| "?".to_string())
        );

        loop {
            let mut conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("接受连接失败: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let Some(guard) = ActiveGuard::acquire(&self.state) else {
                warn!("连接数已满，拒绝 {:?}", conn.peer_addr());
                let _ = conn
                    .send(&ServerMessage::Error {
                        code: ErrorCode::Busy,
                        message: "Server is busy".to_string(),
                    })
                    .await;
                let _ = conn.close().await;
                continue;
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                handle_connection(state, conn).await;
                drop(guard);
            });
        }
    }
}

/// 处理单个连接直到断开
pub async fn handle_connection(state: Arc<ServerState>, conn: TcpConnection) {
    let conn_id = state.next_conn_id.fetch_add(1, Ordering::SeqCst);
    let peer = conn.peer_addr().unwrap_or_else(|| "unknown".to_string());
    info!(
        "连接 {} 来自 {}（当前 {} 个连接）",
        conn_id,
        peer,
        state.active_connections()
    );

    let (mut reader, mut writer) = conn.split();
    let (outbox, mut inbox) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = inbox.recv().await {
            if let Err(e) = writer.write_frame(&msg).await {
                debug!("连接 {} 写入失败: {}", conn_id, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let heartbeat = state.config.heartbeat_timeout();
    let mut ctx = ClientContext::new(conn_id, outbox);

    loop {
        let msg = match timeout(heartbeat, reader.read_frame::<ClientMessage>()).await {
            Err(_) => {
                info!("连接 {} 心跳超时", conn_id);
                break;
            }
            Ok(Ok(msg)) => msg,
            Ok(Err(ProtocolError::ConnectionClosed)) => break,
            Ok(Err(e @ (ProtocolError::Json(_) | ProtocolError::Bincode(_)))) => {
                // 整帧已读完，流仍然同步
                warn!("连接 {} 消息无法解码: {}", conn_id, e);
                let reply = ServerMessage::Error {
                    code: ErrorCode::MalformedMessage,
                    message: e.to_string(),
                };
                if ctx.outbox.send(reply).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(Err(e)) => {
                warn!("连接 {} 读取失败: {}", conn_id, e);
                break;
            }
        };

        debug!("连接 {} 收到 {:?}", conn_id, msg);
        if let Some(reply) = MessageHandler::handle(&state, &mut ctx, msg).await {
            if ctx.outbox.send(reply).await.is_err() {
                break;
            }
        }
    }

    ctx.leave().await;
    drop(ctx);
    let _ = writer_task.await;
    info!("连接 {} 已断开", conn_id);
}

/// 单个连接的上下文
pub struct ClientContext {
    pub conn_id: ConnId,
    pub outbox: mpsc::Sender<ServerMessage>,
    /// 当前订阅的会话
    pub joined: Option<SessionHandle>,
}

impl ClientContext {
    pub fn new(conn_id: ConnId, outbox: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            conn_id,
            outbox,
            joined: None,
        }
    }

    /// 取消当前订阅
    async fn leave(&mut self) {
        if let Some(handle) = self.joined.take() {
            let _ = handle.unsubscribe(self.conn_id).await;
        }
    }

    /// 订阅指定对局，替换原有订阅
    async fn join(&mut self, state: &ServerState, game_id: &str) -> Result<SessionHandle> {
        self.leave().await;
        let mut handle = state.sessions.get_or_spawn(game_id).await?;
        if let Err(SessionError::Closed(_)) =
            handle.subscribe(self.conn_id, self.outbox.clone()).await
        {
            // 会话恰好空闲退出，重新启动一次
            handle = state.sessions.get_or_spawn(game_id).await?;
            handle.subscribe(self.conn_id, self.outbox.clone()).await?;
        }
        self.joined = Some(handle.clone());
        Ok(handle)
    }

    /// 已订阅该对局则直接返回，否则先订阅
    async fn ensure_joined(&mut self, state: &ServerState, game_id: &str) -> Result<SessionHandle> {
        if let Some(handle) = &self.joined {
            if handle.game_id() == game_id && !handle.is_closed() {
                return Ok(handle.clone());
            }
        }
        self.join(state, game_id).await
    }
}

fn internal_error(e: anyhow::Error) -> ServerMessage {
    warn!("内部错误: {:#}", e);
    ServerMessage::Error {
        code: ErrorCode::InternalError,
        message: format!("{:#}", e),
    }
}

fn missing_game_id() -> ServerMessage {
    let e = MoveError::MissingGameId;
    ServerMessage::Error {
        code: e.code(),
        message: e.to_string(),
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息，返回需要直接回复的消息
    ///
    /// 会话产生的消息（`Joined`、`GameUpdate`、`TurnRejected`）经 outbox 送达，不在返回值里。
    pub async fn handle(
        state: &ServerState,
        ctx: &mut ClientContext,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Join { game_id } => Self::handle_join(state, ctx, game_id).await,
            ClientMessage::Leave => Self::handle_leave(ctx).await,
            ClientMessage::ListGames => Self::handle_list_games(state).await,
            ClientMessage::Turn(turn) => {
                if turn.game_id.trim().is_empty() {
                    let e = MoveError::MissingGameId;
                    return Some(ServerMessage::TurnRejected {
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
                Self::handle_turn(state, ctx, turn).await
            }
            ClientMessage::NewGame { game_id } => {
                if game_id.trim().is_empty() {
                    return Some(missing_game_id());
                }
                Self::handle_new_game(state, ctx, &game_id).await
            }
            ClientMessage::Ping => Some(ServerMessage::Pong),
        }
    }

    /// 处理回合：必要时先订阅该对局，再交给会话排队
    async fn handle_turn(
        state: &ServerState,
        ctx: &mut ClientContext,
        turn: Turn,
    ) -> Option<ServerMessage> {
        let handle = match ctx.ensure_joined(state, &turn.game_id).await {
            Ok(handle) => handle,
            Err(e) => return Some(internal_error(e)),
        };
        match handle.submit(ctx.conn_id, turn).await {
            Ok(()) => None,
            Err(e) => Some(internal_error(e.into())),
        }
    }

    /// 处理新开一局
    async fn handle_new_game(
        state: &ServerState,
        ctx: &mut ClientContext,
        game_id: &str,
    ) -> Option<ServerMessage> {
        let handle = match ctx.ensure_joined(state, game_id).await {
            Ok(handle) => handle,
            Err(e) => return Some(internal_error(e)),
        };
        match handle.new_game(ctx.conn_id).await {
            Ok(()) => None,
            Err(e) => Some(internal_error(e.into())),
        }
    }

    /// 处理加入对局
    async fn handle_join(
        state: &ServerState,
        ctx: &mut ClientContext,
        game_id: String,
    ) -> Option<ServerMessage> {
        if game_id.trim().is_empty() {
            return Some(missing_game_id());
        }
        match ctx.join(state, &game_id).await {
            Ok(_) => None,
            Err(e) => Some(internal_error(e)),
        }
    }

    /// 处理离开对局
    async fn handle_leave(ctx: &mut ClientContext) -> Option<ServerMessage> {
        if ctx.joined.is_none() {
            return Some(ServerMessage::Error {
                code: ErrorCode::NotJoined,
                message: "Not in a game".to_string(),
            });
        }
        ctx.leave().await;
        None
    }

    /// 处理对局列表
    async fn handle_list_games(state: &ServerState) -> Option<ServerMessage> {
        let storage = Arc::clone(state.sessions.storage());
        let result = tokio::task::spawn_blocking(move || storage.list_saved_games())
            .await
            .context("列出对局任务失败")
            .and_then(|games| games);
        Some(match result {
            Ok(games) => ServerMessage::GameList { games },
            Err(e) => internal_error(e),
        })
    }
}
