//! 消息类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{GameState, PlayerMap, Turn};

/// 对局 ID
pub type GameId = String;

/// 已保存对局的摘要（用于列表展示）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub players: PlayerMap,
    pub started: bool,
    pub ended: bool,
    pub saved_at: DateTime<Utc>,
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // === 会话 ===
    /// 订阅一局（不存在则从模板创建）
    Join { game_id: GameId },
    /// 取消订阅当前对局
    Leave,
    /// 列出已保存的对局
    ListGames,

    // === 对局操作 ===
    /// 提交一个回合
    Turn(Turn),
    /// 重新开一局（保留座位）
    NewGame { game_id: GameId },

    // === 心跳 ===
    /// 心跳请求
    Ping,
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// 订阅成功，附带当前快照
    Joined { game: GameState },
    /// 对局快照更新（广播给所有订阅者）
    GameUpdate { game: GameState },
    /// 回合被拒绝（只发给提交者）
    TurnRejected { code: ErrorCode, message: String },
    /// 已保存的对局列表
    GameList { games: Vec<GameSummary> },
    /// 心跳响应
    Pong,
    /// 错误消息
    Error { code: ErrorCode, message: String },
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // === 请求相关 (1xx) ===
    /// 缺少对局 ID
    MissingGameId = 100,
    /// 对局 ID 不符
    GameMismatch = 101,
    /// 坐标无法解析
    MalformedPoint = 102,
    /// 尚未加入对局
    NotJoined = 103,
    /// 消息无法解码
    MalformedMessage = 104,

    // === 规则相关 (2xx) ===
    /// 不是你的回合
    NotYourTurn = 200,
    /// 自杀
    Suicide = 201,
    /// 目标点已有棋子
    Occupied = 202,
    /// 已开局，不能换色
    AlreadyStarted = 203,
    /// 游戏已结束
    GameAlreadyOver = 204,

    // === 座位相关 (3xx) ===
    /// 不在该座位上
    NotSeated = 300,
    /// 已入座
    AlreadySeated = 301,
    /// 座位已满
    SeatsFull = 302,
    /// 无效玩家名
    InvalidName = 303,

    // === 系统相关 (5xx) ===
    /// 内部错误
    InternalError = 500,
    /// 服务器繁忙
    Busy = 501,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MoveKind;
    use crate::point::Stone;

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Turn(Turn::play("g1", "ann", Stone::Black, "4:4"));
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ClientMessage = bincode::deserialize(&bytes).unwrap();

        match decoded {
            ClientMessage::Turn(turn) => {
                assert_eq!(turn.point, "4:4");
                assert_eq!(turn.kind, MoveKind::Play);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_server_message_json() {
        let msg = ServerMessage::GameUpdate {
            game: GameState::template("g1"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_str(&json).unwrap();

        match decoded {
            ServerMessage::GameUpdate { game } => assert_eq!(game, GameState::template("g1")),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_rejection_serialize() {
        let msg = ServerMessage::TurnRejected {
            code: ErrorCode::Suicide,
            message: "Placing at 0:0 would be suicide".to_string(),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ServerMessage = bincode::deserialize(&bytes).unwrap();
        assert!(matches!(
            decoded,
            ServerMessage::TurnRejected { code: ErrorCode::Suicide, .. }
        ));
    }
}
