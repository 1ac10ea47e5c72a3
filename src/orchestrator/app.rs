//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：连接浏览器、创建 JsExecutor、在页面里挂消息监听
//! 2. **资源管理**：持有 Browser 和 PageBridge，消息抽取任务随应用停止
//! 3. **指令循环**：逐行读取标准输入，交给 `Console` 执行

use anyhow::Result;
use chromiumoxide::Browser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{JsExecutor, KeyValueStore, MessagePort, PageBridge, SurfaceAddress};
use crate::orchestrator::console::{Command, Console, Flow, HELP};
use crate::services::{AssessmentService, HttpAssessmentClient};
use crate::utils::logging::log_startup;
use crate::workflow::CaptureRuntime;

/// 应用主结构
pub struct App {
    _browser: Browser,
    runtime: Arc<CaptureRuntime>,
    pump_shutdown: watch::Sender<bool>,
    pump: JoinHandle<()>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        // 连接浏览器
        let (browser, page) = browser::connect_to_assessment_page(
            config.browser_debug_port,
            &config.target_url,
            config.target_title.as_deref(),
        )
        .await?;

        // 创建 JsExecutor（持有 page）
        let executor = JsExecutor::new(page);
        let bridge = Arc::new(PageBridge::new(
            executor,
            config.frame_selector.clone(),
            config.target_origin.clone(),
        ));
        bridge.install().await?;

        let (pump_shutdown, pump_rx) = watch::channel(false);
        let pump = Arc::clone(&bridge).spawn_pump(config.message_pump_interval, pump_rx);

        let service: Arc<dyn AssessmentService> = Arc::new(HttpAssessmentClient::new(&config)?);
        let address: Arc<dyn SurfaceAddress> = bridge.clone();
        let port: Arc<dyn MessagePort> = bridge.clone();
        let store: Arc<dyn KeyValueStore> = bridge;
        let runtime = CaptureRuntime::new(config, address, port, store, service)?;

        info!("✓ 初始化完成");
        Ok(Self {
            _browser: browser,
            runtime,
            pump_shutdown,
            pump,
        })
    }

    /// 运行指令循环，直到 quit 或输入结束
    pub async fn run(self, initial_question: Option<String>) -> Result<()> {
        let mut console = Console::new(Arc::clone(&self.runtime));
        println!("{}", HELP);

        if let Some(question_id) = initial_question {
            print_lines(&console.execute(Command::Open(question_id)).await.lines);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let Some(line) = lines.next_line().await? else {
                info!("标准输入已结束");
                console.shutdown().await;
                break;
            };
            let reply = console.execute(Command::parse(&line)).await;
            print_lines(&reply.lines);
            if reply.flow == Flow::Quit {
                break;
            }
        }

        self.stop().await;
        Ok(())
    }

    async fn stop(self) {
        let _ = self.pump_shutdown.send(true);
        if let Err(e) = self.pump.await {
            warn!("消息抽取任务异常退出: {}", e);
        }
        info!("{}", "=".repeat(60));
        info!("🏁 程序结束");
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
