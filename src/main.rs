use std::path::Path;

use anyhow::Result;
use answer_format_standards::utils::logging;
use answer_format_standards::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：指定了配置文件时读取文件，否则读取环境变量
    let config = match std::env::var("FORMAT_CONFIG_FILE") {
        Ok(path) => Config::from_toml_file(Path::new(&path))?,
        Err(_) => Config::from_env(),
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let _stats = App::initialize(config).await?.run().await?;

    Ok(())
}
