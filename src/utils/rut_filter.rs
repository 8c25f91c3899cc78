use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate for registered worker RUTs.
const FILTER_CAPACITY: usize = 50_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static RUT_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// Check if a normalized RUT might already be registered (false positives possible).
/// A poisoned lock answers "maybe" so the caller falls through to the database.
pub fn might_exist(rut: &str) -> bool {
    RUT_FILTER
        .read()
        .map(|filter| filter.contains(&rut.to_string()))
        .unwrap_or(true)
}

pub fn insert(rut: &str) {
    if let Ok(mut filter) = RUT_FILTER.write() {
        filter.add(&rut.to_string());
    }
}

/// Load every registered RUT into the filter, streaming in batches.
pub async fn warmup_rut_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT rut FROM workers").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (rut,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(rut);
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch)?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch)?;
    }

    log::info!("RUT filter warmup complete: {} workers", total);
    Ok(())
}

fn insert_batch(ruts: &[String]) -> Result<()> {
    let mut filter = RUT_FILTER
        .write()
        .map_err(|_| anyhow!("RUT filter lock poisoned"))?;

    for rut in ruts {
        filter.add(rut);
    }
    Ok(())
}
