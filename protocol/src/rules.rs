//! 落子合法性与提子
//!
//! 判定顺序：
//! 1. 目标点必须为空
//! 2. 四面全是己方棋子的点直接合法（己方围住的眼，不再做任何检查）
//! 3. 目标点在落子前有空的相邻点 -> 暂定合法
//! 4. 落子后检查每个相邻的对方棋块，无气的整块提掉，落子因此合法
//! 5. 以上都不成立时，检查落子后己方棋块（提子之后）是否有气，无气即自杀
//!
//! 所有修改都发生在工作副本上，判定失败时调用方的棋盘保持原样。

use crate::board::Board;
use crate::error::MoveError;
use crate::group::{group_has_no_liberties, neighbors, neighbors_with_state};
use crate::point::{Point, PointState, Stone};

/// 一次合法落子的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// 落子并提子后的棋盘
    pub board: Board,
    /// 被提掉的对方棋子（按坐标排序）
    pub captured: Vec<Point>,
}

/// 目标点的所有相邻点都是己方棋子
///
/// 这是一条刻意保留的简化规则：只看直接相邻的点，不管外围大棋块还有没有气。
/// 严格的自杀判定在外围棋块无气时会给出相反的结论。
pub fn is_fully_enclosed(point: Point, color: Stone, board: &Board) -> bool {
    let own = PointState::from(color);
    neighbors(point).all(|n| board.state_at(n) == own)
}

/// 在 `point` 落下 `color`，返回新棋盘与提子列表
pub fn place_stone(point: Point, color: Stone, board: &Board) -> Result<Placement, MoveError> {
    if !board.state_at(point).is_empty() {
        return Err(MoveError::Occupied { point: point.key() });
    }

    let own = PointState::from(color);
    if is_fully_enclosed(point, color, board) {
        return Ok(Placement {
            board: board.with_point_set(point, own),
            captured: Vec::new(),
        });
    }

    let mut valid = !neighbors_with_state(point, board, PointState::Empty).is_empty();

    let mut next = board.with_point_set(point, own);
    let mut captured = Vec::new();
    let opponent = PointState::from(color.opponent());

    for seed in neighbors_with_state(point, &next, opponent) {
        // 同一棋块可能挨着目标点的多个方向，前面已经提掉的跳过
        if next.state_at(seed) != opponent {
            continue;
        }
        let (dead, group) = group_has_no_liberties(seed, &next);
        if dead {
            valid = true;
            next.clear_points(&group);
            captured.extend(group);
        }
    }

    if !valid {
        let (dead, _) = group_has_no_liberties(point, &next);
        if dead {
            return Err(MoveError::Suicide { point: point.key() });
        }
    }

    captured.sort();
    Ok(Placement { board: next, captured })
}

/// 以线上坐标键落子，返回 `(是否合法, 结果棋盘)`
///
/// 键为空、无法解析或落子非法时返回 `false` 和原棋盘的副本。
pub fn apply_play(key: &str, color: Stone, board: &Board) -> (bool, Board) {
    let Ok(point) = key.parse::<Point>() else {
        return (false, *board);
    };
    match place_stone(point, color, board) {
        Ok(placement) => (true, placement.board),
        Err(_) => (false, *board),
    }
}
