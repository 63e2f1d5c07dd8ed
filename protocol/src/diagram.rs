//! 棋盘文本图示
//!
//! 19 行，每行 19 个字符：
//! - `.` 空点（`+` 也可）
//! - `b` 黑子
//! - `w` 白子
//!
//! 第一行是第 0 行，每行第一个字符是第 0 列。行内空格忽略，空行忽略。

use crate::board::Board;
use crate::constants::BOARD_SIZE;
use crate::error::ParseError;
use crate::point::{Point, PointState};

/// 解析图示为棋盘
pub fn parse(diagram: &str) -> Result<Board, ParseError> {
    let rows: Vec<&str> = diagram
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if rows.len() != BOARD_SIZE {
        return Err(ParseError::InvalidDiagram {
            reason: format!("Expected {} rows, got {}", BOARD_SIZE, rows.len()),
        });
    }

    let mut board = Board::empty();
    for (row_idx, row) in rows.iter().enumerate() {
        let mut col = 0usize;
        for c in row.chars().filter(|c| !c.is_whitespace()) {
            if col >= BOARD_SIZE {
                return Err(ParseError::InvalidDiagram {
                    reason: format!("Row {} has too many columns", row_idx),
                });
            }
            let state = match c {
                '.' | '+' => PointState::Empty,
                'b' | 'B' | 'x' | 'X' => PointState::Black,
                'w' | 'W' | 'o' | 'O' => PointState::White,
                other => {
                    return Err(ParseError::InvalidDiagram {
                        reason: format!("Invalid character {:?} in row {}", other, row_idx),
                    })
                }
            };
            board.set(Point::new_unchecked(row_idx as u8, col as u8), state);
            col += 1;
        }
        if col != BOARD_SIZE {
            return Err(ParseError::InvalidDiagram {
                reason: format!("Row {} has {} columns, expected {}", row_idx, col, BOARD_SIZE),
            });
        }
    }

    Ok(board)
}

/// 把棋盘渲染为图示（每行以换行结尾）
pub fn render(board: &Board) -> String {
    let mut out = String::with_capacity(BOARD_SIZE * (BOARD_SIZE + 1));
    for cols in board.rows() {
        for state in cols {
            out.push(match state {
                PointState::Empty => '.',
                PointState::Black => 'b',
                PointState::White => 'w',
            });
        }
        out.push('\n');
    }
    out
}
