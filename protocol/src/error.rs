//! 错误类型定义

use thiserror::Error;

use crate::message::ErrorCode;

/// 坐标 / 颜色解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 缺少 `:` 分隔符或分段数量不对
    #[error("Invalid point key: {key:?}")]
    InvalidKey { key: String },

    /// 行或列不是十进制数字
    #[error("Invalid coordinate {part:?} in point key {key:?}")]
    InvalidNumber { key: String, part: String },

    /// 坐标超出棋盘
    #[error("Point ({row}, {col}) is off the board")]
    OutOfRange { row: i64, col: i64 },

    /// 无效的棋子颜色
    #[error("Invalid stone color: {0:?}")]
    InvalidColor(String),

    /// 无效的棋盘图示
    #[error("Invalid board diagram: {reason}")]
    InvalidDiagram { reason: String },
}

/// 回合被拒绝的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    /// 缺少对局 ID
    #[error("Missing game id")]
    MissingGameId,

    /// 对局 ID 与当前会话不符
    #[error("Turn for game {actual:?} sent to game {expected:?}")]
    GameMismatch { expected: String, actual: String },

    /// 落子缺少坐标
    #[error("Play without a point")]
    MissingPoint,

    /// 坐标无法解析
    #[error("Malformed point: {0}")]
    MalformedPoint(#[from] ParseError),

    /// 目标点已有棋子
    #[error("Point {point} is already occupied")]
    Occupied { point: String },

    /// 自杀（落子后己方无气且未提子）
    #[error("Placing at {point} would be suicide")]
    Suicide { point: String },

    /// 不是你的回合
    #[error("Not your turn")]
    NotYourTurn,

    /// 玩家未坐在提交的颜色上
    #[error("{player:?} is not seated as {color}")]
    NotSeated { player: String, color: String },

    /// 玩家已入座
    #[error("{player:?} already holds a seat")]
    AlreadySeated { player: String },

    /// 玩家名为空或过长
    #[error("Invalid player name")]
    InvalidName,

    /// 两个座位都已有人
    #[error("Both seats are taken")]
    SeatsFull,

    /// 开局后不能换色
    #[error("Colors cannot be switched after the game has started")]
    AlreadyStarted,

    /// 游戏已结束
    #[error("Game is already over")]
    GameOver,
}

impl MoveError {
    /// 对应的线上错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            MoveError::MissingGameId => ErrorCode::MissingGameId,
            MoveError::GameMismatch { .. } => ErrorCode::GameMismatch,
            MoveError::MissingPoint | MoveError::MalformedPoint(_) => ErrorCode::MalformedPoint,
            MoveError::Occupied { .. } => ErrorCode::Occupied,
            MoveError::Suicide { .. } => ErrorCode::Suicide,
            MoveError::NotYourTurn => ErrorCode::NotYourTurn,
            MoveError::AlreadyStarted => ErrorCode::AlreadyStarted,
            MoveError::GameOver => ErrorCode::GameAlreadyOver,
            MoveError::NotSeated { .. } => ErrorCode::NotSeated,
            MoveError::AlreadySeated { .. } => ErrorCode::AlreadySeated,
            MoveError::InvalidName => ErrorCode::InvalidName,
            MoveError::SeatsFull => ErrorCode::SeatsFull,
        }
    }
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 规则错误
    #[error("Move error: {0}")]
    Move(#[from] MoveError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
