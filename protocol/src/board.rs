//! 棋盘状态

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{BOARD_SIZE, MAX_COORD, POINT_COUNT};
use crate::point::{Point, PointState};

/// 19x19 棋盘
///
/// 固定大小数组，坐标由 [`Point`] 保证在界内，因此不存在"缺失的键"。
/// 修改采用写时复制：[`Board::with_point_set`] 返回新棋盘，原棋盘不变；
/// 规则引擎只在自己克隆出的工作副本上调用 [`Board::set`]。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    grid: [[PointState; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// 创建空棋盘（所有会话的初始模板）
    pub fn empty() -> Self {
        Self {
            grid: [[PointState::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// 获取指定坐标的状态
    pub fn state_at(&self, point: Point) -> PointState {
        self.grid[point.row() as usize][point.col() as usize]
    }

    /// 原地设置指定坐标
    pub fn set(&mut self, point: Point, state: PointState) {
        self.grid[point.row() as usize][point.col() as usize] = state;
    }

    /// 返回设置了指定坐标的新棋盘
    pub fn with_point_set(&self, point: Point, state: PointState) -> Board {
        let mut next = *self;
        next.set(point, state);
        next
    }

    /// 清空一组坐标（提子）
    pub fn clear_points<'a, I>(&mut self, points: I)
    where
        I: IntoIterator<Item = &'a Point>,
    {
        for point in points {
            self.set(*point, PointState::Empty);
        }
    }

    /// 按行优先遍历所有交叉点
    pub fn points(&self) -> impl Iterator<Item = (Point, PointState)> + '_ {
        self.grid.iter().enumerate().flat_map(|(row, cols)| {
            cols.iter()
                .enumerate()
                .map(move |(col, state)| (Point::new_unchecked(row as u8, col as u8), *state))
        })
    }

    /// 统计某种状态的交叉点数量
    pub fn count(&self, state: PointState) -> usize {
        self.grid
            .iter()
            .flat_map(|cols| cols.iter())
            .filter(|s| **s == state)
            .count()
    }

    /// 与另一棋盘不同的交叉点数量
    pub fn diff_count(&self, other: &Board) -> usize {
        self.points()
            .zip(other.points())
            .filter(|((_, a), (_, b))| a != b)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.count(PointState::Empty) == POINT_COUNT
    }

    /// 行数据（供文本图示使用）
    pub(crate) fn rows(&self) -> &[[PointState; BOARD_SIZE]; BOARD_SIZE] {
        &self.grid
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board {{")?;
        write!(f, "{}", crate::diagram::render(self))?;
        write!(f, "}}")
    }
}

// 线格式：{"<row>": {"<col>": "e" | "b" | "w"}}，与旧客户端的嵌套对象一致

struct RowRef<'a>(&'a [PointState; BOARD_SIZE]);

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(BOARD_SIZE))?;
        for (col, state) in self.0.iter().enumerate() {
            map.serialize_entry(&col.to_string(), state)?;
        }
        map.end()
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(BOARD_SIZE))?;
        for (row, cols) in self.grid.iter().enumerate() {
            map.serialize_entry(&row.to_string(), &RowRef(cols))?;
        }
        map.end()
    }
}

fn parse_index<E: serde::de::Error>(key: &str) -> Result<usize, E> {
    match key.parse::<u8>() {
        Ok(index) if index <= MAX_COORD => Ok(index as usize),
        _ => Err(E::custom(format!("invalid board index {key:?}"))),
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, BTreeMap<String, PointState>>::deserialize(deserializer)?;

        // 缺失的坐标视为空点
        let mut board = Board::empty();
        for (row_key, cols) in &raw {
            let row = parse_index::<D::Error>(row_key)?;
            for (col_key, state) in cols {
                let col = parse_index::<D::Error>(col_key)?;
                board.grid[row][col] = *state;
            }
        }
        Ok(board)
    }
}
