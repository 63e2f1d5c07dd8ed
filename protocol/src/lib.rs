//! 19 路围棋共享协议库
//!
//! 包含:
//! - 交叉点、棋盘等核心数据结构
//! - 棋块连通性搜索、落子合法性与提子
//! - 回合状态机（入座、换色、落子、停一手、认输）
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits) 与帧编解码

mod board;
mod constants;
pub mod diagram;
mod error;
mod game;
pub mod group;
mod message;
mod point;
pub mod rules;
mod transport;

pub use board::Board;
pub use constants::*;
pub use error::{MoveError, ParseError, ProtocolError, Result};
pub use game::{apply_turn, resolve_turn, GameState, MoveKind, Phase, PlayerMap, Resolution, Turn};
pub use group::{group_has_no_liberties, neighbors_with_state};
pub use message::{ClientMessage, ErrorCode, GameId, GameSummary, ServerMessage};
pub use point::{Point, PointState, Stone};
pub use rules::{apply_play, place_stone, Placement};
pub use transport::{
    Connection, Connector, FrameReader, FrameWriter, Listener, NetworkConfig, TcpConnection,
    TcpConnector, TcpListener, WireFormat,
};
