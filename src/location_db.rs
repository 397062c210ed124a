use anyhow::Result;
use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::cmp::Ordering;
use std::path::Path;

use crate::location_fix::LocationFix;

/* Append-only log of every accepted fix. Rows are never updated or deleted
here; the in-memory partitions in `location_store` are the query side and this
file only exists so a restart does not lose history.

`seq` is the store-assigned ingestion sequence, so it is the primary key and
also the replay order.
*/

pub const DB_FILE_NAME: &str = "locations.db";

#[allow(clippy::type_complexity)]
fn run_migration(
    conn: &mut Connection,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<()> {
    let tx = conn.transaction()?;

    let version = init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, migration) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                migration(&tx)?;
            }
            set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(())
}

fn init_metadata_and_get_version(tx: &Transaction) -> Result<i32> {
    tx.execute(
        "CREATE TABLE IF NOT EXISTS `db_metadata` (
            `key`   TEXT NOT NULL,
            `value` TEXT,
            PRIMARY KEY(`key`)
        )",
        (),
    )?;
    let version_str: Option<String> = tx
        .query_row(
            "SELECT `value` FROM `db_metadata` WHERE key='version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match version_str {
        None => Ok(0),
        Some(s) => Ok(s.parse()?),
    }
}

fn set_version_in_metadata(tx: &Transaction, version: i32) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
        ("version", version.to_string()),
    )?;
    Ok(())
}

fn create_location_fix_table(tx: &Transaction) -> Result<()> {
    let sql = "
    CREATE TABLE location_fix (
        seq           INTEGER PRIMARY KEY
                              NOT NULL
                              UNIQUE,
        vehicle_id    INTEGER NOT NULL,
        lat           REAL    NOT NULL,
        lng           REAL    NOT NULL,
        speed         REAL,
        heading       REAL,
        accuracy      REAL,
        timestamp_ms  INTEGER NOT NULL
    );
    CREATE INDEX location_fix_vehicle_index ON location_fix (
        vehicle_id, timestamp_ms DESC
    );
    ";
    for s in sql_split::split(sql) {
        tx.execute(&s, ())?;
    }
    Ok(())
}

pub struct LocationDb {
    conn: Connection,
}

impl LocationDb {
    pub fn open(support_dir: &Path) -> Result<LocationDb> {
        debug!("opening location db in {:?}", support_dir);
        std::fs::create_dir_all(support_dir)?;
        let conn = Connection::open(support_dir.join(DB_FILE_NAME))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<LocationDb> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<LocationDb> {
        run_migration(&mut conn, &[&create_location_fix_table])?;
        Ok(LocationDb { conn })
    }

    pub fn append(&mut self, fix: &LocationFix) -> Result<()> {
        let sql = "INSERT INTO location_fix (seq, vehicle_id, lat, lng, speed, heading, accuracy, timestamp_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);";
        self.conn.prepare_cached(sql)?.execute((
            fix.ingestion_seq,
            fix.vehicle_id,
            fix.latitude,
            fix.longitude,
            fix.speed,
            fix.heading,
            fix.accuracy,
            fix.timestamp.timestamp_millis(),
        ))?;
        Ok(())
    }

    pub fn max_seq(&self) -> Result<Option<i64>> {
        let seq = self
            .conn
            .query_row("SELECT MAX(seq) FROM location_fix;", (), |row| row.get(0))?;
        Ok(seq)
    }

    /// Every stored fix in ingestion order.
    pub fn load_all(&self) -> Result<Vec<LocationFix>> {
        let mut query = self.conn.prepare(
            "SELECT seq, vehicle_id, lat, lng, speed, heading, accuracy, timestamp_ms FROM location_fix ORDER BY seq;",
        )?;
        let mut rows = query.query(())?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let timestamp_ms: i64 = row.get(7)?;
            let timestamp = DateTime::from_timestamp_millis(timestamp_ms)
                .ok_or_else(|| anyhow!("invalid timestamp_ms in location log: {}", timestamp_ms))?;
            results.push(LocationFix {
                ingestion_seq: row.get(0)?,
                vehicle_id: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
                speed: row.get(4)?,
                heading: row.get(5)?,
                accuracy: row.get(6)?,
                timestamp,
            });
        }
        Ok(results)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }
}
