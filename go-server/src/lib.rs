//! 19 路围棋服务端
//!
//! 包含:
//! - 对局会话（每局一个串行处理回合的任务）
//! - 会话注册表
//! - 连接处理与消息分发
//! - 对局快照存储
//! - 配置加载

pub mod config;
pub mod registry;
pub mod server;
pub mod session;
pub mod storage;

pub use config::ServerConfig;
pub use registry::SessionRegistry;
pub use server::{ClientContext, MessageHandler, Server, ServerState};
pub use session::{ConnId, SessionError, SessionHandle};
pub use storage::StorageManager;
