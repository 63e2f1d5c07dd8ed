//! 棋块连通性搜索
//!
//! 棋块不单独存储：每次合法性检查时从种子点出发按需计算，用完即弃
//! （或直接交给提子使用）。

use std::collections::{HashSet, VecDeque};

use crate::board::Board;
use crate::point::{Point, PointState};

/// 四个方向，固定顺序：左、上、右、下
const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (-1, 0), (0, 1), (1, 0)];

/// 取状态为 `wanted` 的相邻点
///
/// 只看上下左右，对角不算相邻；出界的邻点在查询棋盘之前就被排除。
pub fn neighbors_with_state(point: Point, board: &Board, wanted: PointState) -> Vec<Point> {
    DIRECTIONS
        .iter()
        .filter_map(|&(d_row, d_col)| point.offset(d_row, d_col))
        .filter(|neighbor| board.state_at(*neighbor) == wanted)
        .collect()
}

/// 在棋盘内的所有相邻点
pub fn neighbors(point: Point) -> impl Iterator<Item = Point> {
    DIRECTIONS
        .into_iter()
        .filter_map(move |(d_row, d_col)| point.offset(d_row, d_col))
}

/// 判断种子所在棋块是否没有气
///
/// 广度优先遍历同色相邻点。遇到任何一个空的相邻点就立即返回
/// `(false, 部分访问集)`，调用方应丢弃该集合；遍历完整个棋块仍未找到气
/// 则返回 `(true, 整个棋块)`，即应被提掉的棋子。
///
/// 种子本身是空点时没有棋块可言，返回 `(false, 空集)`。
pub fn group_has_no_liberties(seed: Point, board: &Board) -> (bool, HashSet<Point>) {
    let color = board.state_at(seed);
    let mut visited = HashSet::new();
    if color == PointState::Empty {
        return (false, visited);
    }

    let mut frontier = VecDeque::new();
    visited.insert(seed);
    frontier.push_back(seed);

    while let Some(current) = frontier.pop_front() {
        if !neighbors_with_state(current, board, PointState::Empty).is_empty() {
            return (false, visited);
        }
        for next in neighbors_with_state(current, board, color) {
            // 入队时标记，保证同一点不会重复入队
            if visited.insert(next) {
                frontier.push_back(next);
            }
        }
    }

    (true, visited)
}
