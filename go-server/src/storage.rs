//! 对局快照存储
//!
//! 每局一个 JSON 文件 `<编码后的 id>.json`。读取时找不到该局的记录就回退到默认对局，
//! 默认对局也没有则使用空棋盘模板，保证会话总能启动。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use protocol::{GameState, GameSummary};

use crate::config::ServerConfig;

/// 快照文件格式版本
pub const SNAPSHOT_VERSION: &str = "1.0";

/// 快照文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedGame {
    version: String,
    saved_at: DateTime<Utc>,
    state: GameState,
}

/// 存储管理器
pub struct StorageManager {
    saves_dir: PathBuf,
    default_game_id: String,
}

impl StorageManager {
    /// 在指定目录上创建存储管理器
    pub fn new(saves_dir: PathBuf, default_game_id: impl Into<String>) -> Result<Self> {
        // 确保目录存在
        if !saves_dir.exists() {
            fs::create_dir_all(&saves_dir)
                .with_context(|| format!("无法创建存储目录: {:?}", saves_dir))?;
        }

        Ok(Self {
            saves_dir,
            default_game_id: default_game_id.into(),
        })
    }

    /// 按配置创建，未配置目录时使用系统数据目录
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let saves_dir = match &config.saves_dir {
            Some(dir) => dir.clone(),
            None => get_saves_directory()?,
        };
        Self::new(saves_dir, config.default_game_id.clone())
    }

    /// 保存对局快照，返回文件路径
    pub fn save_game(&self, state: &GameState) -> Result<PathBuf> {
        let filepath = self.saves_dir.join(snapshot_filename(&state.id));
        let saved = SavedGame {
            version: SNAPSHOT_VERSION.to_string(),
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let json_content = serde_json::to_string_pretty(&saved).context("序列化对局快照失败")?;

        // 先写临时文件再改名，避免留下写了一半的快照
        let tmp_path = filepath.with_extension("json.tmp");
        fs::write(&tmp_path, json_content)
            .with_context(|| format!("写入文件失败: {:?}", tmp_path))?;
        fs::rename(&tmp_path, &filepath)
            .with_context(|| format!("重命名文件失败: {:?}", filepath))?;

        Ok(filepath)
    }

    /// 加载指定对局的快照，没有记录时返回 None
    pub fn load_game(&self, game_id: &str) -> Result<Option<GameState>> {
        Ok(self.load_saved(game_id)?.map(|saved| saved.state))
    }

    fn load_saved(&self, game_id: &str) -> Result<Option<SavedGame>> {
        let filepath = self.saves_dir.join(snapshot_filename(game_id));
        if !filepath.exists() {
            return Ok(None);
        }
        read_snapshot(&filepath).map(Some)
    }

    /// 加载对局，依次回退到默认对局和空模板
    ///
    /// 回退得到的快照会改用请求的 ID。损坏的文件记录警告后跳过。
    pub fn load_or_template(&self, game_id: &str) -> GameState {
        let candidates = [game_id, self.default_game_id.as_str()];
        for candidate in candidates {
            match self.load_game(candidate) {
                Ok(Some(mut state)) => {
                    state.id = game_id.to_string();
                    return state;
                }
                Ok(None) => {}
                Err(e) => warn!("跳过无法读取的快照 {}: {:#}", candidate, e),
            }
        }
        GameState::template(game_id)
    }

    /// 列出所有保存的对局
    pub fn list_saved_games(&self) -> Result<Vec<GameSummary>> {
        let mut games = Vec::new();

        let entries = fs::read_dir(&self.saves_dir)
            .with_context(|| format!("读取存储目录失败: {:?}", self.saves_dir))?;

        for entry in entries {
            let entry = entry.context("读取目录项失败")?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match read_snapshot(&path) {
                Ok(saved) => games.push(GameSummary {
                    id: saved.state.id,
                    players: saved.state.players,
                    started: saved.state.started,
                    ended: saved.state.ended,
                    saved_at: saved.saved_at,
                }),
                Err(e) => {
                    // 跳过损坏的文件
                    warn!("跳过损坏的快照 {:?}: {:#}", path, e);
                }
            }
        }

        // 按保存时间倒序排列
        games.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(games)
    }

    /// 获取存储目录路径
    pub fn saves_directory(&self) -> &Path {
        &self.saves_dir
    }
}

/// 获取跨平台存储目录
fn get_saves_directory() -> Result<PathBuf> {
    let app_data_dir = dirs::data_dir().context("无法获取应用数据目录")?;

    Ok(app_data_dir.join("gogo").join("games"))
}

/// 读取并解析一个快照文件
fn read_snapshot(path: &Path) -> Result<SavedGame> {
    let content =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("解析对局快照失败: {:?}", path))
}

/// 对局 ID 对应的文件名
fn snapshot_filename(game_id: &str) -> String {
    format!("{}.json", encode_game_id(game_id))
}

/// 把对局 ID 编码成安全的文件名
///
/// ASCII 字母、数字、`-`、`_` 原样保留，其余字节（包括 `%` 本身）写成 `%XX`，
/// 因此不同的 ID 总是得到不同的文件名。空 ID 编码为单独的 `%`。
fn encode_game_id(game_id: &str) -> String {
    if game_id.is_empty() {
        return "%".to_string();
    }
    let mut encoded = String::with_capacity(game_id.len());
    for byte in game_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{apply_turn, MoveKind, Point, PointState, Stone, Turn};
    use tempfile::TempDir;

    fn create_test_storage() -> (StorageManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path().to_path_buf(), "theonlygame").unwrap();
        (storage, temp_dir)
    }

    fn played(id: &str) -> GameState {
        let state = GameState::template(id);
        let state = apply_turn(&Turn::new(id, "ann", Stone::Black, MoveKind::Name), &state).unwrap();
        apply_turn(&Turn::play(id, "ann", Stone::Black, "4:4"), &state).unwrap()
    }

    #[test]
    fn test_save_and_load_game() {
        let (storage, _temp_dir) = create_test_storage();
        let state = played("g1");

        let path = storage.save_game(&state).unwrap();
        assert!(path.ends_with("g1.json"));

        let loaded = storage.load_game("g1").unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.board.state_at(Point::new(4, 4).unwrap()), PointState::Black);
    }

    #[test]
    fn test_missing_game_falls_back_to_template() {
        let (storage, _temp_dir) = create_test_storage();

        assert!(storage.load_game("nope").unwrap().is_none());
        let state = storage.load_or_template("nope");
        assert_eq!(state, GameState::template("nope"));
    }

    #[test]
    fn test_missing_game_falls_back_to_default_game() {
        let (storage, _temp_dir) = create_test_storage();
        storage.save_game(&played("theonlygame")).unwrap();

        let state = storage.load_or_template("other");
        assert_eq!(state.id, "other");
        assert_eq!(state.players.black, "ann");
        assert!(state.started);
    }

    #[test]
    fn test_corrupt_snapshot_is_skipped() {
        let (storage, temp_dir) = create_test_storage();
        fs::write(temp_dir.path().join("bad.json"), "{ not json").unwrap();

        assert!(storage.load_game("bad").is_err());
        assert_eq!(storage.load_or_template("bad"), GameState::template("bad"));
        assert!(storage.list_saved_games().unwrap().is_empty());
    }

    #[test]
    fn test_list_saved_games() {
        let (storage, _temp_dir) = create_test_storage();
        for id in ["a", "b", "c"] {
            storage.save_game(&played(id)).unwrap();
        }

        let games = storage.list_saved_games().unwrap();
        assert_eq!(games.len(), 3);
        assert!(games.iter().all(|g| g.started && g.players.black == "ann"));

        // 验证排序（最新的在前）
        for i in 0..games.len() - 1 {
            assert!(games[i].saved_at >= games[i + 1].saved_at);
        }
    }

    #[test]
    fn test_overwrite_keeps_single_file() {
        let (storage, temp_dir) = create_test_storage();
        storage.save_game(&GameState::template("g1")).unwrap();
        storage.save_game(&played("g1")).unwrap();

        let files: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert!(storage.load_game("g1").unwrap().unwrap().started);
    }

    #[test]
    fn test_encode_game_id() {
        assert_eq!(encode_game_id("theonlygame"), "theonlygame");
        assert_eq!(encode_game_id("a:b"), "a%3Ab");
        assert_eq!(encode_game_id("a_b"), "a_b");
        assert_eq!(encode_game_id("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_eq!(encode_game_id("100%"), "100%25");
        assert_eq!(encode_game_id(""), "%");
    }

    #[test]
    fn test_similar_ids_stay_separate() {
        let (storage, temp_dir) = create_test_storage();
        storage.save_game(&played("a:b")).unwrap();

        // "a_b" 没有记录，也不应读到 "a:b" 的对局
        assert_eq!(storage.load_or_template("a_b"), GameState::template("a_b"));

        storage.save_game(&GameState::template("a_b")).unwrap();
        assert_eq!(storage.load_game("a:b").unwrap().unwrap().players.black, "ann");
        assert!(!storage.load_game("a_b").unwrap().unwrap().started);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 2);

        let mut ids: Vec<_> = storage
            .list_saved_games()
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a:b".to_string(), "a_b".to_string()]);
    }
}
