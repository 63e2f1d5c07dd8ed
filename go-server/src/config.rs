//! 服务端配置
//!
//! 加载顺序：内置默认值 -> JSON 配置文件（第一个命令行参数或 `GOGO_CONFIG`）
//! -> `GOGO_PORT` 环境变量覆盖端口。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use protocol::{NetworkConfig, DEFAULT_GAME_ID, HEARTBEAT_TIMEOUT_SECS, MAX_CONNECTIONS};

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "GOGO_CONFIG";

/// 端口覆盖环境变量
pub const PORT_ENV: &str = "GOGO_PORT";

/// 服务端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    /// 快照目录，未设置时使用系统数据目录
    pub saves_dir: Option<PathBuf>,
    /// 每个会话回合队列的容量
    pub session_queue_capacity: usize,
    /// 无消息多久后断开连接（秒）
    pub heartbeat_timeout_secs: u64,
    /// 会话没有订阅者多久后退出（秒）
    pub session_idle_timeout_secs: u64,
    /// 找不到对局记录时回退使用的对局
    pub default_game_id: String,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            saves_dir: None,
            session_queue_capacity: 64,
            heartbeat_timeout_secs: HEARTBEAT_TIMEOUT_SECS,
            session_idle_timeout_secs: 60,
            default_game_id: DEFAULT_GAME_ID.to_string(),
            max_connections: MAX_CONNECTIONS,
        }
    }
}

impl ServerConfig {
    /// 从 JSON 文件加载，缺省字段取默认值
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("配置文件无效: {:?}", path))?;
        Ok(config)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<()> {
        ensure!(self.heartbeat_timeout_secs > 0, "heartbeat_timeout_secs 必须大于 0");
        ensure!(self.session_idle_timeout_secs > 0, "session_idle_timeout_secs 必须大于 0");
        ensure!(self.session_queue_capacity > 0, "session_queue_capacity 必须大于 0");
        ensure!(!self.default_game_id.is_empty(), "default_game_id 不能为空");
        Ok(())
    }

    /// 从命令行参数和环境变量构造
    pub fn from_env() -> Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV).ok());

        let mut config = match path {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_port_override(std::env::var(PORT_ENV).ok())?;
        Ok(config)
    }

    /// 覆盖监听端口
    pub fn apply_port_override(&mut self, port: Option<String>) -> Result<()> {
        if let Some(port) = port {
            self.network.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} 不是有效端口: {:?}", PORT_ENV, port))?;
        }
        Ok(())
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::WireFormat;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.network.port, 4000);
        assert_eq!(config.network.wire_format, WireFormat::Json);
        assert_eq!(config.default_game_id, "theonlygame");
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("server.json");
        fs::write(
            &path,
            r#"{"network": {"port": 5000, "wire_format": "bincode"}, "session_queue_capacity": 8}"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.network.port, 5000);
        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.network.wire_format, WireFormat::Bincode);
        assert_eq!(config.session_queue_capacity, 8);
        assert_eq!(config.max_connections, MAX_CONNECTIONS);
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("server.json");
        fs::write(&path, "not json").unwrap();

        assert!(ServerConfig::load(&path).is_err());
        assert!(ServerConfig::load(&temp_dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("server.json");

        fs::write(&path, r#"{"heartbeat_timeout_secs": 0}"#).unwrap();
        assert!(ServerConfig::load(&path).is_err());

        fs::write(&path, r#"{"session_idle_timeout_secs": 0}"#).unwrap();
        assert!(ServerConfig::load(&path).is_err());

        fs::write(&path, r#"{"heartbeat_timeout_secs": 5}"#).unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(5));
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_port_override() {
        let mut config = ServerConfig::default();
        config.apply_port_override(Some("4100".to_string())).unwrap();
        assert_eq!(config.network.port, 4100);

        assert!(config.apply_port_override(Some("port".to_string())).is_err());
        config.apply_port_override(None).unwrap();
        assert_eq!(config.network.port, 4100);
    }
}
