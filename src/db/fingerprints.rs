//! Fingerprint index operations

use crate::error::Result;
use crate::fingerprint::Couple;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

/// Addresses probed per SELECT, kept comfortably below SQLite's bound
/// parameter limit.
const PROBE_CHUNK: usize = 500;

/// Triples inserted per multi-row INSERT (three bind parameters each)
const INSERT_CHUNK: usize = 300;

/// Insert a batch of index triples in a single transaction.
///
/// Triples that already exist are silently ignored; any other per-row error
/// rolls the whole batch back.
pub async fn store_fingerprints(
    pool: &SqlitePool,
    fingerprints: &HashMap<u32, Couple<u32>>,
) -> Result<()> {
    let triples: Vec<(u32, u32, u32)> = fingerprints
        .iter()
        .map(|(address, couple)| (*address, couple.anchor_time_ms, couple.tag))
        .collect();

    let mut tx = pool.begin().await?;
    insert_triples(&mut tx, &triples).await?;
    tx.commit().await?;

    Ok(())
}

/// Insert (address, anchorTimeMs, songId) triples inside an open
/// transaction, chunked into multi-row statements.
pub(crate) async fn insert_triples(
    tx: &mut Transaction<'_, Sqlite>,
    triples: &[(u32, u32, u32)],
) -> Result<()> {
    for chunk in triples.chunks(INSERT_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO fingerprints (address, anchor_time_ms, song_id) ",
        );
        builder.push_values(chunk, |mut row, (address, anchor_time_ms, song_id)| {
            row.push_bind(*address as i64)
                .push_bind(*anchor_time_ms as i64)
                .push_bind(*song_id as i64);
        });
        builder.push(" ON CONFLICT (address, anchor_time_ms, song_id) DO NOTHING");
        builder.build().execute(&mut **tx).await?;
    }

    Ok(())
}

/// Fetch every index entry whose address appears in the query set.
///
/// Returns a map from address to the (anchorTimeMs, songId) couples stored
/// under it; addresses with no entries are absent. Order within each list
/// is unspecified.
pub async fn lookup_addresses(
    pool: &SqlitePool,
    addresses: &[u32],
) -> Result<HashMap<u32, Vec<(u32, u32)>>> {
    let mut hits: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();

    for chunk in addresses.chunks(PROBE_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT address, anchor_time_ms, song_id FROM fingerprints WHERE address IN (",
        );
        let mut separated = builder.separated(", ");
        for address in chunk {
            separated.push_bind(*address as i64);
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(pool).await?;
        for row in rows {
            let address: i64 = row.get("address");
            let anchor_time_ms: i64 = row.get("anchor_time_ms");
            let song_id: i64 = row.get("song_id");
            hits.entry(address as u32)
                .or_default()
                .push((anchor_time_ms as u32, song_id as u32));
        }
    }

    Ok(hits)
}

/// Number of index triples. Mostly useful for logging and tests.
pub async fn total_fingerprints(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
        .fetch_one(pool)
        .await?;

    Ok(count as u64)
}
