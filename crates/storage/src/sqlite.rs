use rusqlite::{Connection, OptionalExtension};

use crate::error::StorageError;
use crate::traits::KvStore;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl KvStore for SqliteStore {
    fn get_raw(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                rusqlite::params![namespace, key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put_raw(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
             ON CONFLICT (namespace, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            rusqlite::params![namespace, key, value],
        )?;
        Ok(())
    }

    fn remove_raw(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
            rusqlite::params![namespace, key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() -> Result<(), StorageError> {
        let mut store = SqliteStore::open_in_memory()?;
        store.put_raw("ns", "k", b"hello")?;
        assert_eq!(store.get_raw("ns", "k")?, Some(b"hello".to_vec()));
        Ok(())
    }

    #[test]
    fn namespaces_do_not_bleed() -> Result<(), StorageError> {
        let mut store = SqliteStore::open_in_memory()?;
        store.put_raw("a", "k", b"alpha")?;
        store.put_raw("b", "k", b"beta")?;

        assert_eq!(store.get_raw("a", "k")?, Some(b"alpha".to_vec()));
        assert_eq!(store.get_raw("b", "k")?, Some(b"beta".to_vec()));
        assert_eq!(store.get_raw("c", "k")?, None);
        Ok(())
    }

    #[test]
    fn put_fully_replaces() -> Result<(), StorageError> {
        let mut store = SqliteStore::open_in_memory()?;
        store.put_raw("ns", "k", b"a much longer first value")?;
        store.put_raw("ns", "k", b"short")?;
        assert_eq!(store.get_raw("ns", "k")?, Some(b"short".to_vec()));
        Ok(())
    }

    #[test]
    fn values_survive_reopen() -> Result<(), StorageError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("till.db");
        let path = path.to_str().expect("utf-8 path");

        {
            let mut store = SqliteStore::open(path)?;
            store.put_raw("=b1/=u1", "outbox.inventory", b"queued")?;
        }

        let store = SqliteStore::open(path)?;
        assert_eq!(
            store.get_raw("=b1/=u1", "outbox.inventory")?,
            Some(b"queued".to_vec())
        );
        Ok(())
    }

    #[test]
    fn remove_is_idempotent() -> Result<(), StorageError> {
        let mut store = SqliteStore::open_in_memory()?;
        store.put_raw("ns", "k", b"v")?;
        store.remove_raw("ns", "k")?;
        store.remove_raw("ns", "k")?;
        assert_eq!(store.get_raw("ns", "k")?, None);
        Ok(())
    }
}
