use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Normalized RUT => worker id for workers known to exist.
pub static RUT_CACHE: Lazy<Cache<String, u64>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400))
        .build()
});

pub async fn remember(rut: &str, worker_id: u64) {
    RUT_CACHE.insert(rut.to_string(), worker_id).await;
}

pub async fn worker_for(rut: &str) -> Option<u64> {
    RUT_CACHE.get(rut).await
}

async fn batch_remember(rows: &[(String, u64)]) {
    let futures: Vec<_> = rows
        .iter()
        .map(|(rut, id)| RUT_CACHE.insert(rut.clone(), *id))
        .collect();

    futures::future::join_all(futures).await;
}

/// Load workers with attendance in the last `days` days, they are the ones
/// most likely to be looked up again.
pub async fn warmup_rut_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, u64)>(
        r#"
        SELECT DISTINCT w.rut, w.id
        FROM workers w
        JOIN worker_attendance wa ON wa.worker_id = w.id
        WHERE wa.date >= CURDATE() - INTERVAL ? DAY
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total_count += 1;

        if batch.len() >= batch_size {
            batch_remember(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_remember(&batch).await;
    }

    log::info!(
        "RUT cache warmup complete: {} recent workers (last {} days)",
        total_count,
        days
    );

    Ok(())
}
