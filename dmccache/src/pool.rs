//! Pool de connexions SQLite.
//!
//! Le store persistant est consulté via des connexions poolées :
//! [`ConnectionPool::acquire_if_available`] rend `None` quand aucune connexion
//! n'est libre, et la connexion est toujours restituée au drop du guard,
//! succès comme échec.

use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

struct PoolInner {
    idle: Mutex<Vec<Connection>>,
    path: PathBuf,
}

/// Pool de connexions vers la base de métadonnées.
///
/// Taille fixe : les connexions sont ouvertes à l'init et recyclées. Le pool
/// est clonable (handle partagé).
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Ouvre le pool et initialise le schéma.
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin du fichier SQLite
    /// * `size` - Nombre de connexions ouvertes
    pub fn open(path: &Path, size: usize) -> crate::Result<Self> {
        let mut idle = Vec::with_capacity(size);
        for i in 0..size.max(1) {
            let conn = Connection::open(path)?;
            if i == 0 {
                crate::db::init_schema(&conn)?;
            }
            idle.push(conn);
        }
        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(idle),
                path: path.to_path_buf(),
            }),
        })
    }

    /// Chemin du fichier de base de données.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Emprunte une connexion si une est disponible, `None` sinon.
    ///
    /// Jamais bloquant : l'appelant dégrade en mode sans cache persistant
    /// quand le pool est épuisé.
    pub fn acquire_if_available(&self) -> Option<PooledConnection> {
        let conn = self.inner.idle.lock().unwrap().pop()?;
        Some(PooledConnection {
            conn: Some(conn),
            pool: self.inner.clone(),
        })
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("path", &self.inner.path)
            .finish()
    }
}

/// Connexion empruntée au pool, restituée au drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.idle.lock().unwrap().push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_hands_out_at_most_size_connections() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("test.db"), 2).unwrap();

        let c1 = pool.acquire_if_available();
        let c2 = pool.acquire_if_available();
        assert!(c1.is_some());
        assert!(c2.is_some());
        assert!(pool.acquire_if_available().is_none());

        drop(c1);
        assert!(pool.acquire_if_available().is_some());
        drop(c2);
    }
}
