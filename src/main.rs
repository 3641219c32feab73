#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::{env, sync::Arc};

use anyhow::Result;
use tokio_cron_scheduler::JobScheduler;

use crate::event::price_watch::PriceWatch;

pub mod bot;
pub mod config;
pub mod crawler;
pub mod declare;
pub mod event;
pub mod logging;
pub mod scheduler;
pub mod sheet;
pub mod util;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    install_crypto_provider();

    let setting = config::App::get()?;
    let watch = Arc::new(PriceWatch::from_config(&setting)?);

    if !setting.system.run_forever {
        return match watch.execute().await {
            Ok(report) => {
                logging::info_console(format!(
                    "{} {}: {} (1h {} %) alerted: {}",
                    report.quote.symbol,
                    report.quote.convert,
                    report.quote.price,
                    report.quote.change_1h,
                    report.alerted
                ));
                Ok(())
            }
            Err(why) => {
                logging::error_console(why.to_string());
                Err(why.into())
            }
        };
    }

    let mut sched = JobScheduler::new().await?;
    scheduler::start(&sched, watch, &setting.system.cron).await?;

    logging::info_console(format!(
        "CryptoTracker 已啟動 ({})\r\nRust OS/Arch: {}/{}",
        setting.system.cron,
        env::consts::OS,
        env::consts::ARCH
    ));

    tokio::signal::ctrl_c().await?;
    sched.shutdown().await?;
    logging::info_console("CryptoTracker 已停止".to_string());

    Ok(())
}

/// reqwest 與 lettre 共用 ring 作為 rustls 的加密實作
pub(crate) fn install_crypto_provider() {
    // 已安裝過會回傳 Err，忽略即可
    let _ = rustls::crypto::ring::default_provider().install_default();
}
