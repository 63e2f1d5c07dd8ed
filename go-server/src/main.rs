use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use go_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("go_server=debug".parse()?))
        .init();

    info!("围棋服务端启动中...");

    let config = ServerConfig::from_env()?;
    let server = Server::new(config)?;
    let listener = server.bind().await?;

    tokio::select! {
        result = server.run(listener) => {
            if let Err(e) = &result {
                error!("服务器异常退出: {:#}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到退出信号，服务器关闭");
            Ok(())
        }
    }
}
