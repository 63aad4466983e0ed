//! Explicit transactions.
//!
//! A [`Tx`] is a cheap handle; clones share one transaction. It lends one
//! connection per database key to every query or model it is attached to.
//! Borrowers never commit, roll back or close that connection; only
//! [`Tx::commit`] and [`Tx::rollback`] end the transaction. Dropping the last
//! handle of an unfinished transaction rolls it back.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use recordkit_core::{Connection, Error, Result, TransactionError, TransactionErrorKind, Value};

use crate::db::{DbConfig, Registry};

/// Context key holding the id of the user on whose behalf the transaction runs.
pub const CURRENT_USER_ID: &str = "current_user_id";

type Joined = Vec<(String, Arc<dyn Connection>)>;

#[derive(Default)]
struct TxState {
    connections: Joined,
    context: HashMap<String, Value>,
    /// Tables created inside this transaction, registered once it commits.
    created: Vec<(Arc<Registry>, String)>,
    finished: bool,
}

struct TxInner {
    id: String,
    state: Mutex<TxState>,
}

impl TxInner {
    fn lock(&self) -> MutexGuard<'_, TxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TxInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.finished || state.connections.is_empty() {
            return;
        }
        tracing::warn!(txid = %self.id, "Transaction dropped without commit, rolling back");
        for (key, conn) in state.connections.drain(..) {
            if let Err(e) = conn.rollback() {
                tracing::warn!(txid = %self.id, db = %key, error = %e, "Rollback failed");
            }
        }
    }
}

/// Handle to one transaction spanning any number of databases.
#[derive(Clone)]
pub struct Tx {
    inner: Arc<TxInner>,
}

impl Tx {
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        tracing::debug!(txid = %id, "Transaction started");
        Self {
            inner: Arc::new(TxInner {
                id,
                state: Mutex::new(TxState::default()),
            }),
        }
    }

    /// Unique id of this transaction.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The connection this transaction holds for `db`, opened and begun on first use.
    pub fn connection(&self, db: &DbConfig) -> Result<Arc<dyn Connection>> {
        let mut state = self.inner.lock();
        if state.finished {
            return Err(finished(&self.inner.id));
        }
        if let Some((_, conn)) = state.connections.iter().find(|(k, _)| k == db.key()) {
            return Ok(Arc::clone(conn));
        }

        let conn = db.connection()?;
        conn.begin()?;
        tracing::debug!(txid = %self.inner.id, db = db.key(), "Transaction joined database");
        state
            .connections
            .push((db.key().to_string(), Arc::clone(&conn)));
        Ok(conn)
    }

    pub fn set_context(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.lock().context.insert(key.into(), value.into());
    }

    pub fn context(&self, key: &str) -> Option<Value> {
        self.inner.lock().context.get(key).cloned()
    }

    /// Set the [`CURRENT_USER_ID`] context value.
    pub fn set_user(&self, user: impl Into<Value>) {
        self.set_context(CURRENT_USER_ID, user);
    }

    pub fn user(&self) -> Option<Value> {
        self.context(CURRENT_USER_ID)
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished
    }

    /// Register `key` in `registry` when this transaction commits.
    ///
    /// DDL run inside the transaction is undone by a rollback, so the table
    /// only counts as created once the commit succeeds.
    pub(crate) fn register_on_commit(&self, registry: &Arc<Registry>, key: &str) {
        self.inner
            .lock()
            .created
            .push((Arc::clone(registry), key.to_string()));
    }

    /// Commit on every joined database, in join order.
    ///
    /// On the first failure the remaining databases are rolled back.
    pub fn commit(&self) -> Result<()> {
        let (connections, created) = self.finish()?;
        let mut iter = connections.into_iter();
        while let Some((key, conn)) = iter.next() {
            if let Err(e) = conn.commit() {
                tracing::warn!(txid = %self.inner.id, db = %key, error = %e, "Commit failed");
                for (rest_key, rest) in iter {
                    if let Err(rollback_err) = rest.rollback() {
                        tracing::warn!(
                            txid = %self.inner.id,
                            db = %rest_key,
                            error = %rollback_err,
                            "Rollback after commit failure failed"
                        );
                    }
                }
                return Err(e);
            }
        }
        for (registry, key) in created {
            registry.insert(&key);
        }
        tracing::debug!(txid = %self.inner.id, "Transaction committed");
        Ok(())
    }

    /// Roll back every joined database. All are attempted; the first error is returned.
    pub fn rollback(&self) -> Result<()> {
        let (connections, _) = self.finish()?;
        let mut first_error = None;
        for (key, conn) in connections {
            if let Err(e) = conn.rollback() {
                tracing::warn!(txid = %self.inner.id, db = %key, error = %e, "Rollback failed");
                first_error.get_or_insert(e);
            }
        }
        tracing::debug!(txid = %self.inner.id, "Transaction rolled back");
        first_error.map_or(Ok(()), Err)
    }

    fn finish(&self) -> Result<(Joined, Vec<(Arc<Registry>, String)>)> {
        let mut state = self.inner.lock();
        if state.finished {
            return Err(finished(&self.inner.id));
        }
        state.finished = true;
        Ok((
            std::mem::take(&mut state.connections),
            std::mem::take(&mut state.created),
        ))
    }

    /// Run `f` as one atomic unit.
    ///
    /// With `Some(tx)` the work joins that transaction and its owner decides the
    /// outcome. With `None` a new transaction is started, committed when `f`
    /// succeeds and rolled back when it fails.
    pub fn execute<T, F>(tx: Option<&Tx>, f: F) -> Result<T>
    where
        F: FnOnce(&Tx) -> Result<T>,
    {
        if let Some(tx) = tx {
            return f(tx);
        }

        let tx = Tx::new();
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(txid = tx.id(), error = %rollback_err, "Rollback after failure failed");
                }
                Err(e)
            }
        }
    }
}

impl Default for Tx {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Tx {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Tx")
            .field("id", &self.inner.id)
            .field("databases", &state.connections.len())
            .field("finished", &state.finished)
            .finish()
    }
}

fn finished(id: &str) -> Error {
    Error::Transaction(TransactionError {
        kind: TransactionErrorKind::Finished,
        message: format!("Transaction {} already finished", id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_db;

    #[test]
    fn test_connection_shared_per_db() {
        let (db, conn) = mock_db("a");
        let tx = Tx::new();
        let c1 = tx.connection(&db).unwrap();
        let c2 = tx.connection(&db).unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));
        assert_eq!(conn.log(), vec!["BEGIN"]);
        tx.commit().unwrap();
        assert_eq!(conn.log(), vec!["BEGIN", "COMMIT"]);
        assert!(tx.is_finished());
        assert!(tx.commit().is_err());
    }

    #[test]
    fn test_drop_rolls_back() {
        let (db, conn) = mock_db("b");
        {
            let tx = Tx::new();
            let clone = tx.clone();
            clone.connection(&db).unwrap();
        }
        assert_eq!(conn.log(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_execute_commits_or_rolls_back() {
        let (db, conn) = mock_db("c");
        let n = Tx::execute(None, |tx| {
            tx.connection(&db)?;
            Ok(3)
        })
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(conn.log(), vec!["BEGIN", "COMMIT"]);

        let r: Result<()> = Tx::execute(None, |tx| {
            tx.connection(&db)?;
            Err(Error::config("fail"))
        });
        assert!(r.is_err());
        assert_eq!(conn.log(), vec!["BEGIN", "COMMIT", "BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_execute_joins_outer_tx() {
        let (db, conn) = mock_db("d");
        let outer = Tx::new();
        outer.set_user("u1");
        Tx::execute(Some(&outer), |tx| {
            assert_eq!(tx, &outer);
            assert_eq!(tx.user(), Some(Value::from("u1")));
            tx.connection(&db).map(|_| ())
        })
        .unwrap();
        assert_eq!(conn.log(), vec!["BEGIN"]);
        outer.rollback().unwrap();
        assert_eq!(conn.log(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_created_tables_registered_on_commit() {
        let (db, _) = mock_db("e");
        let tx = Tx::new();
        tx.connection(&db).unwrap();
        tx.register_on_commit(db.registry(), "e:t");
        assert!(!db.registry().contains("e:t"));
        tx.commit().unwrap();
        assert!(db.registry().contains("e:t"));
    }

    #[test]
    fn test_created_tables_dropped_on_rollback() {
        let (db, _) = mock_db("f");
        let tx = Tx::new();
        tx.connection(&db).unwrap();
        tx.register_on_commit(db.registry(), "f:t");
        tx.rollback().unwrap();
        assert!(!db.registry().contains("f:t"));

        let (db, conn) = mock_db("g");
        conn.fail_on("COMMIT");
        let tx = Tx::new();
        tx.connection(&db).unwrap();
        tx.register_on_commit(db.registry(), "g:t");
        assert!(tx.commit().is_err());
        assert!(!db.registry().contains("g:t"));
    }
}
