use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// user id -> display name, used when rendering request lists and log
/// lines without an extra join per row.
pub static USER_NAME_CACHE: Lazy<Cache<u64, String>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

/// Resolve a user's display name, falling back to the database on a miss.
pub async fn display_name(pool: &MySqlPool, user_id: u64) -> Option<String> {
    if let Some(name) = USER_NAME_CACHE.get(&user_id).await {
        return Some(name);
    }

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()?;

    USER_NAME_CACHE.insert(user_id, name.clone()).await;
    Some(name)
}

/// Drop a cached name after a user is renamed or deleted.
pub async fn invalidate(user_id: u64) {
    USER_NAME_CACHE.invalidate(&user_id).await;
}

async fn batch_insert(entries: &[(u64, String)]) {
    let futures: Vec<_> = entries
        .iter()
        .map(|(id, name)| USER_NAME_CACHE.insert(*id, name.clone()))
        .collect();

    futures::future::join_all(futures).await;
}

/// Preload every user name into the cache in batches at startup.
pub async fn warmup_user_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (u64, String)>("SELECT id, name FROM users ORDER BY id").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let entry = row?;
        batch.push(entry);
        total_count += 1;

        if batch.len() >= batch_size {
            batch_insert(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_insert(&batch).await;
    }

    tracing::info!("User name cache warmup complete: {} users", total_count);

    Ok(())
}
