use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{event::price_watch::PriceWatch, logging};

/// 啟動排程：先執行一次，之後依 cron 定時執行
///
/// The cron expression is evaluated against the wall clock on every tick, so
/// a slow run never pushes the next one later.
pub async fn start(sched: &JobScheduler, watch: Arc<PriceWatch>, cron_expr: &str) -> Result<()> {
    let running = Arc::new(Mutex::new(()));

    run_once(&watch, &running, cron_expr).await;

    sched
        .add(create_job(cron_expr, watch, running)?)
        .await?;
    sched.start().await?;

    Ok(())
}

fn create_job(cron_expr: &str, watch: Arc<PriceWatch>, running: Arc<Mutex<()>>) -> Result<Job> {
    let expr = cron_expr.to_string();

    Ok(Job::new_async(cron_expr, move |_uuid, _l| {
        let watch = watch.clone();
        let running = running.clone();
        let expr = expr.clone();
        Box::pin(async move {
            run_once(&watch, &running, &expr).await;
        })
    })?)
}

/// 上一輪還沒結束就跳過這一輪
async fn run_once(watch: &PriceWatch, running: &Mutex<()>, cron_expr: &str) {
    let Ok(_guard) = running.try_lock() else {
        logging::warn_file_async(format!(
            "Skip task({}) because the previous run is still in progress",
            cron_expr
        ));
        return;
    };

    match watch.execute().await {
        Ok(report) => {
            logging::info_file_async(format!(
                "Task({}) finished: price {} 1h {} alerted {}",
                cron_expr, report.quote.price, report.quote.change_1h, report.alerted
            ));
        }
        Err(why) => {
            logging::error_file_async(format!(
                "Failed to execute task({}) because {}",
                cron_expr, why
            ));
        }
    }
}
