use anyhow::Result;
use circuit_capture::config::Config;
use circuit_capture::logger;
use circuit_capture::orchestrator::App;
use std::path::PathBuf;

/// 没有指定时读取当前目录下的配置文件（不存在则只用环境变量）
const DEFAULT_CONFIG_FILE: &str = "capture.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config_path = std::env::var("CAPTURE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load(Some(config_path.as_path()))?;

    // 初始化日志
    logger::init(config.verbose_logging);

    // 第一个参数作为初始题目ID
    let initial_question = std::env::args().nth(1);

    // 初始化并运行应用
    App::initialize(config).await?.run(initial_question).await?;

    Ok(())
}
