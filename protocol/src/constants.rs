//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（19 路）
pub const BOARD_SIZE: usize = 19;

/// 最大坐标（行列均为 0..=18）
pub const MAX_COORD: u8 = (BOARD_SIZE - 1) as u8;

/// 棋盘交叉点总数
pub const POINT_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// 默认对局 ID（旧客户端只会发送这一局）
pub const DEFAULT_GAME_ID: &str = "theonlygame";

/// 玩家标识最大长度（字符数），容得下 UUID 等常见 ID
pub const MAX_NAME_LEN: usize = 256;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端最大连接数
pub const MAX_CONNECTIONS: usize = 100;

/// 服务端心跳超时（秒）- 超过此时间无消息则断开
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
