//! 对局状态与回合状态机
//!
//! 状态：未开始 -> 进行中 -> 已结束（终态）
//! - `switch` 只能在未开始时进行
//! - `resign` 从任何未结束的状态直接进入已结束
//! - 第一次合法的 `play` 使对局开始
//! - `pass` 和 `name` 不改变开始 / 结束标志
//!
//! [`apply_turn`] 是纯函数：同一个回合作用在同一个快照上总是得到相同结果，
//! 被拒绝的回合不会改动任何状态。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::constants::MAX_NAME_LEN;
use crate::error::MoveError;
use crate::point::{Point, Stone};
use crate::rules::place_stone;

/// 回合动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    /// 交换颜色（仅开局前）
    Switch,
    /// 落子
    Play,
    /// 停一手
    Pass,
    /// 认输
    Resign,
    /// 入座
    Name,
}

/// 对局阶段（由 started / ended 两个标志推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Started,
    Ended,
}

/// 座位分配：黑白两个座位上的玩家名，空字符串表示无人
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMap {
    #[serde(rename = "b", default)]
    pub black: String,
    #[serde(rename = "w", default)]
    pub white: String,
}

impl PlayerMap {
    /// 某个座位上的玩家
    pub fn get(&self, seat: Stone) -> Option<&str> {
        let name = match seat {
            Stone::Black => &self.black,
            Stone::White => &self.white,
        };
        (!name.is_empty()).then_some(name.as_str())
    }

    fn set(&mut self, seat: Stone, player: &str) {
        match seat {
            Stone::Black => self.black = player.to_string(),
            Stone::White => self.white = player.to_string(),
        }
    }

    /// 玩家所在的座位
    pub fn seat_of(&self, player: &str) -> Option<Stone> {
        if player.is_empty() {
            None
        } else if self.black == player {
            Some(Stone::Black)
        } else if self.white == player {
            Some(Stone::White)
        } else {
            None
        }
    }

    /// 玩家是否坐在指定座位上
    pub fn is_seated(&self, player: &str, seat: Stone) -> bool {
        self.get(seat) == Some(player)
    }

    /// 两个座位都已有人
    pub fn is_full(&self) -> bool {
        self.get(Stone::Black).is_some() && self.get(Stone::White).is_some()
    }

    /// 交换黑白座位
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.black, &mut self.white);
    }
}

/// 权威对局快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub id: String,
    pub board: Board,
    /// 最后一手落子的坐标键，停一手后为空
    #[serde(default)]
    pub last_played: String,
    /// 下一个该行动的玩家，可能为空
    #[serde(default)]
    pub next_player: String,
    #[serde(default)]
    pub players: PlayerMap,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub winner: String,
}

impl GameState {
    /// 标准空棋盘模板
    pub fn template(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            board: Board::empty(),
            last_played: String::new(),
            next_player: String::new(),
            players: PlayerMap::default(),
            started: false,
            ended: false,
            winner: String::new(),
        }
    }

    /// 新开一局：同一 ID、保留座位，棋盘和标志重置
    pub fn new_game(&self) -> Self {
        let mut state = Self::template(self.id.clone());
        state.players = self.players.clone();
        state.next_player = state.players.black.clone();
        state
    }

    pub fn phase(&self) -> Phase {
        if self.ended {
            Phase::Ended
        } else if self.started {
            Phase::Started
        } else {
            Phase::NotStarted
        }
    }
}

/// 客户端提交的一个回合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    #[serde(alias = "id", default)]
    pub game_id: String,
    pub player: String,
    pub color: Stone,
    #[serde(rename = "move")]
    pub kind: MoveKind,
    /// `"row:col"`，非落子动作为空
    #[serde(default)]
    pub point: String,
    /// false 表示同一玩家的回合还没结束
    #[serde(default)]
    pub finished_turn: bool,
    /// 客户端眼中的当前棋盘，仅用于诊断
    #[serde(default)]
    pub board_temp: Option<Board>,
}

impl Turn {
    /// 构造一个已结束的回合（测试和工具使用）
    pub fn new(game_id: &str, player: &str, color: Stone, kind: MoveKind) -> Self {
        Self {
            game_id: game_id.to_string(),
            player: player.to_string(),
            color,
            kind,
            point: String::new(),
            finished_turn: true,
            board_temp: None,
        }
    }

    /// 落子回合
    pub fn play(game_id: &str, player: &str, color: Stone, point: &str) -> Self {
        Self {
            point: point.to_string(),
            ..Self::new(game_id, player, color, MoveKind::Play)
        }
    }
}

/// 一个被接受的回合的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: GameState,
    /// 本回合提掉的棋子
    pub captured: Vec<Point>,
}

/// 回合作用于快照，得到新快照
pub fn apply_turn(turn: &Turn, state: &GameState) -> Result<GameState, MoveError> {
    resolve_turn(turn, state).map(|resolution| resolution.state)
}

/// 同 [`apply_turn`]，额外返回提子信息
pub fn resolve_turn(turn: &Turn, state: &GameState) -> Result<Resolution, MoveError> {
    if turn.game_id.is_empty() {
        return Err(MoveError::MissingGameId);
    }
    if turn.game_id != state.id {
        return Err(MoveError::GameMismatch {
            expected: state.id.clone(),
            actual: turn.game_id.clone(),
        });
    }
    if state.phase() == Phase::Ended {
        return Err(MoveError::GameOver);
    }

    let mut next = state.clone();
    let mut captured = Vec::new();

    match turn.kind {
        MoveKind::Name => seat_player(turn, &mut next)?,
        MoveKind::Switch => {
            require_seat(turn, state)?;
            if state.phase() != Phase::NotStarted {
                return Err(MoveError::AlreadyStarted);
            }
            next.players.swap();
            next.next_player = next.players.black.clone();
        }
        MoveKind::Play => {
            if turn.point.is_empty() {
                return Err(MoveError::MissingPoint);
            }
            let point: Point = turn.point.parse()?;
            require_turn(turn, state)?;

            let placement = place_stone(point, turn.color, &state.board)?;
            next.board = placement.board;
            next.started = true;
            next.last_played = point.key();
            next.next_player = next_player_after(turn, &state.players);
            captured = placement.captured;
        }
        MoveKind::Pass => {
            require_turn(turn, state)?;
            next.last_played.clear();
            next.next_player = next_player_after(turn, &state.players);
        }
        MoveKind::Resign => {
            require_seat(turn, state)?;
            next.ended = true;
            next.winner = state
                .players
                .get(turn.color.opponent())
                .unwrap_or_default()
                .to_string();
            next.next_player.clear();
        }
    }

    Ok(Resolution { state: next, captured })
}

/// 下一个行动的玩家：回合未结束则还是自己，否则是对方座位上的玩家
fn next_player_after(turn: &Turn, players: &PlayerMap) -> String {
    if !turn.finished_turn {
        return turn.player.clone();
    }
    players
        .get(turn.color.opponent())
        .unwrap_or_default()
        .to_string()
}

fn require_seat(turn: &Turn, state: &GameState) -> Result<(), MoveError> {
    if state.players.is_seated(&turn.player, turn.color) {
        Ok(())
    } else {
        Err(MoveError::NotSeated {
            player: turn.player.clone(),
            color: turn.color.to_string(),
        })
    }
}

fn require_turn(turn: &Turn, state: &GameState) -> Result<(), MoveError> {
    require_seat(turn, state)?;
    if state.next_player != turn.player {
        return Err(MoveError::NotYourTurn);
    }
    Ok(())
}

/// 入座：优先请求的颜色，否则唯一的空位，都满则失败
///
/// 玩家标识按原样保存，之后的座位和回合检查都按原样比较。
fn seat_player(turn: &Turn, next: &mut GameState) -> Result<(), MoveError> {
    let name = turn.player.as_str();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(MoveError::InvalidName);
    }
    if next.players.seat_of(name).is_some() {
        return Err(MoveError::AlreadySeated { player: name.to_string() });
    }

    if next.players.is_full() {
        return Err(MoveError::SeatsFull);
    }
    let seat = match next.players.get(turn.color) {
        None => turn.color,
        Some(_) => turn.color.opponent(),
    };
    next.players.set(seat, name);

    if next.next_player.is_empty() {
        next.next_player = match next.phase() {
            Phase::NotStarted => next.players.black.clone(),
            _ => name.to_string(),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointState;

    const GAME: &str = "theonlygame";

    fn seated() -> GameState {
        let mut state = GameState::template(GAME);
        state = apply_turn(&Turn::new(GAME, "ann", Stone::Black, MoveKind::Name), &state).unwrap();
        state = apply_turn(&Turn::new(GAME, "bob", Stone::Black, MoveKind::Name), &state).unwrap();
        state
    }

    #[test]
    fn test_template() {
        let state = GameState::template("g1");
        assert_eq!(state.phase(), Phase::NotStarted);
        assert!(state.board.is_empty());
        assert_eq!(state.players, PlayerMap::default());
    }

    #[test]
    fn test_name_prefers_requested_seat_then_free_seat() {
        let state = seated();
        assert_eq!(state.players.get(Stone::Black), Some("ann"));
        // bob 请求黑方但黑方已有人，落到白方
        assert_eq!(state.players.get(Stone::White), Some("bob"));
        assert_eq!(state.next_player, "ann");

        let err = apply_turn(&Turn::new(GAME, "cid", Stone::White, MoveKind::Name), &state);
        assert_eq!(err, Err(MoveError::SeatsFull));
    }

    #[test]
    fn test_name_requested_white() {
        let state = GameState::template(GAME);
        let state = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Name), &state).unwrap();
        assert_eq!(state.players.white, "bob");
        assert_eq!(state.players.black, "");
        assert_eq!(state.next_player, "");
    }

    #[test]
    fn test_name_rejects_duplicates_and_blank() {
        let state = seated();
        let err = apply_turn(&Turn::new(GAME, "ann", Stone::White, MoveKind::Name), &state);
        assert_eq!(err, Err(MoveError::AlreadySeated { player: "ann".into() }));

        let empty = GameState::template(GAME);
        let err = apply_turn(&Turn::new(GAME, "", Stone::Black, MoveKind::Name), &empty);
        assert_eq!(err, Err(MoveError::InvalidName));

        let too_long = "x".repeat(MAX_NAME_LEN + 1);
        let err = apply_turn(&Turn::new(GAME, &too_long, Stone::Black, MoveKind::Name), &empty);
        assert_eq!(err, Err(MoveError::InvalidName));
    }

    #[test]
    fn test_padded_name_is_kept_and_can_play() {
        let state = GameState::template(GAME);
        let state = apply_turn(&Turn::new(GAME, "ann ", Stone::Black, MoveKind::Name), &state).unwrap();
        assert_eq!(state.players.black, "ann ");
        assert_eq!(state.next_player, "ann ");

        let next = apply_turn(&Turn::play(GAME, "ann ", Stone::Black, "3:3"), &state).unwrap();
        assert_eq!(next.board.state_at(Point::new_unchecked(3, 3)), PointState::Black);

        // 去掉空格后是另一个玩家
        let err = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state);
        assert!(matches!(err, Err(MoveError::NotSeated { .. })));
    }

    #[test]
    fn test_uuid_player_id_can_be_seated() {
        let id = "123e4567-e89b-12d3-a456-426614174000";
        let state = GameState::template(GAME);
        let state = apply_turn(&Turn::new(GAME, id, Stone::White, MoveKind::Name), &state).unwrap();
        assert_eq!(state.players.get(Stone::White), Some(id));
        assert_eq!(state.players.seat_of(id), Some(Stone::White));
    }

    #[test]
    fn test_play_starts_game_and_passes_turn() {
        let state = seated();
        let next = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();

        assert_eq!(next.phase(), Phase::Started);
        assert_eq!(next.board.state_at(Point::new_unchecked(3, 3)), PointState::Black);
        assert_eq!(next.last_played, "3:3");
        assert_eq!(next.next_player, "bob");
        // 原快照不变
        assert!(state.board.is_empty());
    }

    #[test]
    fn test_unfinished_turn_keeps_same_player() {
        let state = seated();
        let mut turn = Turn::play(GAME, "ann", Stone::Black, "3:3");
        turn.finished_turn = false;

        let next = apply_turn(&turn, &state).unwrap();
        assert_eq!(next.next_player, "ann");
    }

    #[test]
    fn test_turn_order_enforced() {
        let state = seated();
        let err = apply_turn(&Turn::play(GAME, "bob", Stone::White, "3:3"), &state);
        assert_eq!(err, Err(MoveError::NotYourTurn));

        let err = apply_turn(&Turn::play(GAME, "bob", Stone::Black, "3:3"), &state);
        assert!(matches!(err, Err(MoveError::NotSeated { .. })));
    }

    #[test]
    fn test_malformed_and_missing_points() {
        let state = seated();
        let err = apply_turn(&Turn::play(GAME, "ann", Stone::Black, ""), &state);
        assert_eq!(err, Err(MoveError::MissingPoint));

        let err = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3;3"), &state);
        assert!(matches!(err, Err(MoveError::MalformedPoint(_))));
    }

    #[test]
    fn test_game_id_checks() {
        let state = seated();
        let err = apply_turn(&Turn::play("", "ann", Stone::Black, "3:3"), &state);
        assert_eq!(err, Err(MoveError::MissingGameId));

        let err = apply_turn(&Turn::play("other", "ann", Stone::Black, "3:3"), &state);
        assert!(matches!(err, Err(MoveError::GameMismatch { .. })));
    }

    #[test]
    fn test_illegal_play_leaves_state_unchanged() {
        let mut state = seated();
        state.board = state
            .board
            .with_point_set(Point::new_unchecked(0, 1), PointState::White)
            .with_point_set(Point::new_unchecked(1, 0), PointState::White);
        let before = state.clone();

        let err = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "0:0"), &state);
        assert_eq!(err, Err(MoveError::Suicide { point: "0:0".into() }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_capture_reported() {
        let mut state = seated();
        state.board = state
            .board
            .with_point_set(Point::new_unchecked(0, 0), PointState::White)
            .with_point_set(Point::new_unchecked(0, 1), PointState::Black);

        let resolution =
            resolve_turn(&Turn::play(GAME, "ann", Stone::Black, "1:0"), &state).unwrap();
        assert_eq!(resolution.captured, vec![Point::new_unchecked(0, 0)]);
        assert_eq!(resolution.state.board.count(PointState::White), 0);
    }

    #[test]
    fn test_same_turn_twice_gives_same_state() {
        let state = seated();
        let turn = Turn::play(GAME, "ann", Stone::Black, "9:9");
        let first = apply_turn(&turn, &state).unwrap();
        let second = apply_turn(&turn, &state).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_switch_before_and_after_start() {
        let state = seated();
        let switched = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Switch), &state)
            .unwrap();
        assert_eq!(switched.players.black, "bob");
        assert_eq!(switched.players.white, "ann");
        assert_eq!(switched.next_player, "bob");

        let started = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();
        let err = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Switch), &started);
        assert_eq!(err, Err(MoveError::AlreadyStarted));
    }

    #[test]
    fn test_pass_does_not_start_game() {
        let state = seated();
        let next = apply_turn(&Turn::new(GAME, "ann", Stone::Black, MoveKind::Pass), &state).unwrap();
        assert_eq!(next.phase(), Phase::NotStarted);
        assert_eq!(next.next_player, "bob");
        assert_eq!(next.board, state.board);
    }

    #[test]
    fn test_pass_clears_last_played() {
        let state = seated();
        let state = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();
        let state = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Pass), &state).unwrap();
        assert_eq!(state.last_played, "");
        assert_eq!(state.next_player, "ann");
        assert_eq!(state.phase(), Phase::Started);
    }

    #[test]
    fn test_resign_ends_game() {
        let state = seated();
        let ended = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Resign), &state)
            .unwrap();
        assert_eq!(ended.phase(), Phase::Ended);
        assert_eq!(ended.winner, "ann");
        assert_eq!(ended.next_player, "");

        let err = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &ended);
        assert_eq!(err, Err(MoveError::GameOver));
    }

    #[test]
    fn test_name_after_start_fills_empty_next_player() {
        let mut state = GameState::template(GAME);
        state = apply_turn(&Turn::new(GAME, "ann", Stone::Black, MoveKind::Name), &state).unwrap();
        state = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();
        assert_eq!(state.next_player, "");

        state = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Name), &state).unwrap();
        assert_eq!(state.next_player, "bob");
    }

    #[test]
    fn test_new_game_keeps_seats() {
        let state = seated();
        let state = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();
        let fresh = state.new_game();
        assert!(fresh.board.is_empty());
        assert_eq!(fresh.phase(), Phase::NotStarted);
        assert_eq!(fresh.players, state.players);
        assert_eq!(fresh.next_player, "ann");
    }

    #[test]
    fn test_game_state_json_round_trip() {
        let state = seated();
        let state = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let decoded: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, state);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lastPlayed"], "3:3");
        assert_eq!(value["nextPlayer"], "bob");
        assert_eq!(value["players"]["b"], "ann");
        assert_eq!(value["board"]["3"]["3"], "b");
    }

    #[test]
    fn test_game_state_bincode_round_trip() {
        let state = seated();
        let state = apply_turn(&Turn::play(GAME, "ann", Stone::Black, "3:3"), &state).unwrap();
        let state = apply_turn(&Turn::new(GAME, "bob", Stone::White, MoveKind::Resign), &state).unwrap();

        let bytes = bincode::serialize(&state).unwrap();
        let decoded: GameState = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.winner, "ann");
    }

    #[test]
    fn test_turn_from_legacy_client_json() {
        let json = r#"{
            "id": "theonlygame",
            "player": "ann",
            "color": "b",
            "move": "pass",
            "point": "",
            "finishedTurn": true,
            "boardTemp": null
        }"#;
        let turn: Turn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.game_id, GAME);
        assert_eq!(turn.kind, MoveKind::Pass);
        assert!(turn.finished_turn);
        assert!(turn.board_temp.is_none());
    }
}
