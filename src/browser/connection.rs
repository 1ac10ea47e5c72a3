use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

/// 连接到浏览器并找到考试页面
///
/// 依次按标题关键字、URL 前缀匹配已打开的页面；都找不到时新开页面导航过去。
pub async fn connect_to_assessment_page(
    port: u16,
    target_url: &str,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .map_err(|e| {
            error!("连接浏览器失败: {}", e);
            e
        })
        .with_context(|| format!("无法连接到浏览器调试端口 {}", port))?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    if let Some(title) = target_title {
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 按标题找到考试页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
        debug!("没有标题包含 '{}' 的页面", title);
    }

    for p in pages.iter() {
        if let Ok(Some(url)) = p.url().await {
            if url.starts_with(target_url) {
                info!("✓ 按地址找到考试页面: {}", url);
                return Ok((browser, p.clone()));
            }
        }
    }

    debug!("未找到考试页面，新开页面并导航到: {}", target_url);
    let page = browser
        .new_page(target_url)
        .await
        .with_context(|| format!("导航到 {} 失败", target_url))?;
    info!("已导航到: {}", target_url);

    Ok((browser, page))
}
