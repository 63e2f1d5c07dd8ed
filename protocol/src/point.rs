//! 交叉点与棋子颜色

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::MAX_COORD;
use crate::error::ParseError;

/// 棋子颜色（同时也是座位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stone {
    /// 黑方（先手）
    #[serde(rename = "b")]
    Black,
    /// 白方
    #[serde(rename = "w")]
    White,
}

impl Stone {
    /// 获取对方颜色
    pub fn opponent(&self) -> Stone {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    /// 线上字符
    pub fn as_char(&self) -> char {
        match self {
            Stone::Black => 'b',
            Stone::White => 'w',
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Stone {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b" | "B" => Ok(Stone::Black),
            "w" | "W" => Ok(Stone::White),
            other => Err(ParseError::InvalidColor(other.to_string())),
        }
    }
}

/// 交叉点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PointState {
    /// 空点
    #[default]
    #[serde(rename = "e")]
    Empty,
    /// 黑子
    #[serde(rename = "b")]
    Black,
    /// 白子
    #[serde(rename = "w")]
    White,
}

impl PointState {
    pub fn is_empty(&self) -> bool {
        *self == PointState::Empty
    }
}

impl From<Stone> for PointState {
    fn from(stone: Stone) -> Self {
        match stone {
            Stone::Black => PointState::Black,
            Stone::White => PointState::White,
        }
    }
}

/// 棋盘坐标（行、列均为 0..=18）
///
/// 线上以 `"<row>:<col>"` 表示，同时作为访问集合的键。
/// 字段私有，只能经由带边界检查的构造得到，因此总在棋盘内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    row: u8,
    col: u8,
}

impl Point {
    /// 创建坐标，越界返回 None
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if row <= MAX_COORD && col <= MAX_COORD {
            Some(Self { row, col })
        } else {
            None
        }
    }

    /// 创建坐标（调用方保证在棋盘内）
    pub(crate) const fn new_unchecked(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn col(&self) -> u8 {
        self.col
    }

    /// 带符号坐标的边界检查，用于邻点计算
    pub fn in_bounds(row: i32, col: i32) -> bool {
        (0..=MAX_COORD as i32).contains(&row) && (0..=MAX_COORD as i32).contains(&col)
    }

    /// 按偏移取相邻坐标，出界返回 None
    pub fn offset(&self, d_row: i32, d_col: i32) -> Option<Point> {
        let row = self.row as i32 + d_row;
        let col = self.col as i32 + d_col;
        if Self::in_bounds(row, col) {
            Some(Point::new_unchecked(row as u8, col as u8))
        } else {
            None
        }
    }

    /// 线上键 `"row:col"`
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// 在 19x19 数组中的线性索引
    pub fn to_index(&self) -> usize {
        self.row as usize * crate::constants::BOARD_SIZE + self.col as usize
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

impl FromStr for Point {
    type Err = ParseError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let mut parts = key.split(':');
        let (Some(row), Some(col), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseError::InvalidKey { key: key.to_string() });
        };

        let parse = |part: &str| -> Result<i64, ParseError> {
            let trimmed = part.trim();
            if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::InvalidNumber {
                    key: key.to_string(),
                    part: part.to_string(),
                });
            }
            trimmed.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
                key: key.to_string(),
                part: part.to_string(),
            })
        };

        let (row, col) = (parse(row)?, parse(col)?);
        if row > MAX_COORD as i64 || col > MAX_COORD as i64 {
            return Err(ParseError::OutOfRange { row, col });
        }
        Ok(Point::new_unchecked(row as u8, col as u8))
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}
