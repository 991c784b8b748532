// ============================================================================
// UnlockDb — Embedded Database (redb)
// ============================================================================
// Persistent local ledger of successful unlocks.
// Default path: ~/.agent-unlock/unlocks.redb (override via UNLOCK_DB_PATH)
// ============================================================================

pub mod types;

pub use types::{DbStats, UnlockRecord};

use anyhow::{anyhow, Result};
use redb::{Database, TableDefinition};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Table definitions
const UNLOCKS: TableDefinition<&str, &[u8]> = TableDefinition::new("unlocks");

/// Ledger key for a (user, agent, sub-agent) triple
pub(crate) fn unlock_key(user: &str, agent_id: &str, sub_agent: &str) -> String {
    format!("unlocks:{}:{}:{}", user, agent_id, sub_agent)
}

/// Embedded database holding the unlock ledger
pub struct UnlockDb {
    db: Database,
    path: PathBuf,
}

impl UnlockDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses UNLOCK_DB_PATH env var or ~/.agent-unlock/unlocks.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("UNLOCK_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let unlock_dir = home.join(".agent-unlock");
            std::fs::create_dir_all(&unlock_dir)
                .map_err(|e| anyhow!("Failed to create .agent-unlock directory: {}", e))?;
            unlock_dir.join("unlocks.redb")
        };

        info!("Opening unlock ledger at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(UNLOCKS)
                .map_err(|e| anyhow!("Failed to create unlocks table: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Unlock Record Operations
    // ========================================================================

    /// Upsert the record for its triple (last-write-wins)
    pub fn store_unlock(&self, record: &UnlockRecord) -> Result<()> {
        let key = record.key();
        let value = bincode::serialize(record)
            .map_err(|e| anyhow!("Failed to serialize unlock record: {}", e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(UNLOCKS)
                .map_err(|e| anyhow!("Failed to open unlocks table: {}", e))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert unlock record: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored unlock record: {}", key);
        Ok(())
    }

    pub fn get_unlock(
        &self,
        user: &str,
        agent_id: &str,
        sub_agent: &str,
    ) -> Result<Option<UnlockRecord>> {
        let key = unlock_key(user, agent_id, sub_agent);

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(UNLOCKS)
            .map_err(|e| anyhow!("Failed to open unlocks table: {}", e))?;

        match table
            .get(key.as_str())
            .map_err(|e| anyhow!("Failed to get unlock record: {}", e))?
        {
            Some(value) => {
                let record: UnlockRecord = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize unlock record: {}", e))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn list_unlocks(&self, user_filter: Option<&str>) -> Result<Vec<UnlockRecord>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(UNLOCKS)
            .map_err(|e| anyhow!("Failed to open unlocks table: {}", e))?;

        let mut results = Vec::new();
        let iter = table
            .range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate unlocks: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let record: UnlockRecord = bincode::deserialize(value.value())
                .map_err(|e| anyhow!("Failed to deserialize unlock record: {}", e))?;

            if let Some(filter) = user_filter {
                if record.user == filter {
                    results.push(record);
                }
            } else {
                results.push(record);
            }
        }
        Ok(results)
    }

    pub fn delete_unlock(&self, user: &str, agent_id: &str, sub_agent: &str) -> Result<bool> {
        let key = unlock_key(user, agent_id, sub_agent);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(UNLOCKS)
                .map_err(|e| anyhow!("Failed to open unlocks table: {}", e))?;
            removed = table
                .remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove unlock record: {}", e))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Deleted unlock record: {}", key);
        }
        Ok(removed)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let records = self.list_unlocks(None)?;

        let mut method_counts = std::collections::HashMap::new();
        let mut users = HashSet::new();
        for record in &records {
            *method_counts
                .entry(record.method.display_name().to_string())
                .or_insert(0usize) += 1;
            users.insert(record.user.as_str());
        }

        Ok(DbStats {
            total_unlocks: records.len(),
            method_counts,
            distinct_users: users.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unlock::UnlockMethod;

    fn temp_db() -> (tempfile::TempDir, UnlockDb) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unlocks.redb");
        let db = UnlockDb::open(Some(path.to_str().unwrap())).unwrap();
        (dir, db)
    }

    fn record(user: &str, agent: &str, proof: &str) -> UnlockRecord {
        UnlockRecord {
            user: user.into(),
            agent_id: agent.into(),
            sub_agent: "-".into(),
            method: UnlockMethod::Nft,
            proof: proof.into(),
            cost: 5.0,
            unlocked_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_store_and_get() {
        let (_dir, db) = temp_db();
        let rec = record("u1", "meditation-guide", "0xabc");
        db.store_unlock(&rec).unwrap();

        let got = db.get_unlock("u1", "meditation-guide", "-").unwrap().unwrap();
        assert_eq!(got, rec);
        assert!(db.get_unlock("u2", "meditation-guide", "-").unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_last_write_wins() {
        let (_dir, db) = temp_db();
        db.store_unlock(&record("u1", "meditation-guide", "0xfirst"))
            .unwrap();
        db.store_unlock(&record("u1", "meditation-guide", "0xsecond"))
            .unwrap();

        let all = db.list_unlocks(None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].proof, "0xsecond");
    }

    #[test]
    fn test_list_with_user_filter() {
        let (_dir, db) = temp_db();
        db.store_unlock(&record("u1", "meditation-guide", "0xa")).unwrap();
        db.store_unlock(&record("u1", "sleep-ai", "0xb")).unwrap();
        db.store_unlock(&record("u2", "sleep-ai", "0xc")).unwrap();

        assert_eq!(db.list_unlocks(None).unwrap().len(), 3);
        assert_eq!(db.list_unlocks(Some("u1")).unwrap().len(), 2);
        assert_eq!(db.list_unlocks(Some("u3")).unwrap().len(), 0);
    }

    #[test]
    fn test_delete() {
        let (_dir, db) = temp_db();
        db.store_unlock(&record("u1", "meditation-guide", "0xa")).unwrap();

        assert!(db.delete_unlock("u1", "meditation-guide", "-").unwrap());
        assert!(!db.delete_unlock("u1", "meditation-guide", "-").unwrap());
        assert!(db.get_unlock("u1", "meditation-guide", "-").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let (_dir, db) = temp_db();
        db.store_unlock(&record("u1", "meditation-guide", "0xa")).unwrap();
        db.store_unlock(&record("u2", "focus-coach", "0xb")).unwrap();
        let mut sub = record("u1", "sleep-ai", "sub_1");
        sub.method = UnlockMethod::Subscription;
        db.store_unlock(&sub).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_unlocks, 3);
        assert_eq!(stats.distinct_users, 2);
        assert_eq!(stats.method_counts.get("NFT"), Some(&2));
        assert_eq!(stats.method_counts.get("Subscription"), Some(&1));
    }

    #[test]
    fn test_sub_agent_keys_are_distinct() {
        let (_dir, db) = temp_db();
        let mut whole = record("u1", "meditation-guide", "0xwhole");
        db.store_unlock(&whole).unwrap();
        whole.sub_agent = "breathing".into();
        whole.proof = "0xsub".into();
        db.store_unlock(&whole).unwrap();

        assert_eq!(db.list_unlocks(None).unwrap().len(), 2);
        assert_eq!(
            db.get_unlock("u1", "meditation-guide", "breathing")
                .unwrap()
                .unwrap()
                .proof,
            "0xsub"
        );
    }
}
