//! SQLite persistence for completed tunnel definitions
//!
//! A tunnel is either fully present with all fields populated or entirely
//! absent; the store only ever sees completed records. Statements run
//! without transactions, and nothing enforces name uniqueness, so two
//! sessions can insert same-named tunnels.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info};

use gretun_core::access::AccessLevel;
use gretun_core::types::{Endpoint, OwnerId, Role, Tunnel, TunnelId};

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Keyed store of tunnel records
#[derive(Clone)]
pub struct TunnelStore {
    conn: Arc<Mutex<Connection>>,
}

impl TunnelStore {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!("Opened tunnel store at {:?}", path.as_ref());
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tunnels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner INTEGER NOT NULL,
                host_a TEXT NOT NULL,
                user_a TEXT NOT NULL,
                pass_a TEXT NOT NULL,
                outer_a TEXT NOT NULL,
                host_b TEXT NOT NULL,
                user_b TEXT NOT NULL,
                pass_b TEXT NOT NULL,
                outer_b TEXT NOT NULL,
                inner6_a TEXT NOT NULL,
                inner6_b TEXT NOT NULL,
                psk TEXT NOT NULL,
                mtu_outer INTEGER NOT NULL,
                mtu_inner INTEGER NOT NULL,
                maintenance_hour INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tunnels_owner ON tunnels(owner);
            "#,
        )?;
        debug!("Tunnel store schema initialized");
        Ok(())
    }

    /// Insert a completed tunnel record
    pub fn insert(&self, tunnel: &Tunnel) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tunnels (
                id, name, owner,
                host_a, user_a, pass_a, outer_a,
                host_b, user_b, pass_b, outer_b,
                inner6_a, inner6_b,
                psk, mtu_outer, mtu_inner, maintenance_hour, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                tunnel.id.as_str(),
                tunnel.name,
                tunnel.owner.0,
                tunnel.a.host,
                tunnel.a.username,
                tunnel.a.password,
                tunnel.a.outer_addr,
                tunnel.b.host,
                tunnel.b.username,
                tunnel.b.password,
                tunnel.b.outer_addr,
                Role::A.inner_v6(),
                Role::B.inner_v6(),
                tunnel.psk,
                tunnel.mtu_outer,
                tunnel.mtu_inner,
                tunnel.maintenance_hour,
                tunnel.created_at,
            ],
        )?;
        debug!("Inserted tunnel {} ({})", tunnel.name, tunnel.id);
        Ok(())
    }

    /// List tunnels visible to `owner`: their own, or all for an admin.
    /// Newest first.
    pub fn list(&self, owner: OwnerId, access: AccessLevel) -> Result<Vec<Tunnel>, StoreError> {
        let conn = self.conn.lock();
        let sql_all = "SELECT * FROM tunnels ORDER BY created_at DESC";
        let sql_owned = "SELECT * FROM tunnels WHERE owner = ?1 ORDER BY created_at DESC";

        let mut results = Vec::new();
        if access.is_admin() {
            let mut stmt = conn.prepare(sql_all)?;
            let rows = stmt.query_map([], row_to_tunnel)?;
            for row in rows {
                results.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(sql_owned)?;
            let rows = stmt.query_map(params![owner.0], row_to_tunnel)?;
            for row in rows {
                results.push(row?);
            }
        }
        Ok(results)
    }

    /// Look up a tunnel by name, scoped to `owner` unless admin.
    ///
    /// Names are not unique; if duplicates exist this returns the newest.
    pub fn get_by_name(
        &self,
        name: &str,
        owner: OwnerId,
        access: AccessLevel,
    ) -> Result<Option<Tunnel>, StoreError> {
        let conn = self.conn.lock();
        let tunnel = if access.is_admin() {
            conn.query_row(
                "SELECT * FROM tunnels WHERE name = ?1 ORDER BY created_at DESC LIMIT 1",
                params![name],
                row_to_tunnel,
            )
            .optional()?
        } else {
            conn.query_row(
                "SELECT * FROM tunnels WHERE name = ?1 AND owner = ?2 ORDER BY created_at DESC LIMIT 1",
                params![name, owner.0],
                row_to_tunnel,
            )
            .optional()?
        };
        Ok(tunnel)
    }

    /// Delete a tunnel record, returning whether it existed
    pub fn delete(&self, id: &TunnelId) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM tunnels WHERE id = ?1", params![id.as_str()])?;
        if rows > 0 {
            debug!("Deleted tunnel {}", id);
        }
        Ok(rows > 0)
    }
}

fn row_to_tunnel(row: &Row<'_>) -> rusqlite::Result<Tunnel> {
    Ok(Tunnel {
        id: TunnelId::from(row.get::<_, String>("id")?),
        name: row.get("name")?,
        owner: OwnerId(row.get("owner")?),
        a: Endpoint {
            host: row.get("host_a")?,
            username: row.get("user_a")?,
            password: row.get("pass_a")?,
            outer_addr: row.get("outer_a")?,
        },
        b: Endpoint {
            host: row.get("host_b")?,
            username: row.get("user_b")?,
            password: row.get("pass_b")?,
            outer_addr: row.get("outer_b")?,
        },
        psk: row.get("psk")?,
        mtu_outer: row.get::<_, i64>("mtu_outer")? as u16,
        mtu_inner: row.get::<_, i64>("mtu_inner")? as u16,
        maintenance_hour: row.get::<_, i64>("maintenance_hour")? as u8,
        created_at: row.get("created_at")?,
    })
}
