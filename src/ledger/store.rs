//! SQLite-backed ledger store
//!
//! One account row per user plus an append-only audit trail of every
//! balance change. All mutations run inside a transaction and the debit
//! path is a conditional update, so concurrent requests against the same
//! account serialize on the balance row and can never drive it negative.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, error};
use uuid::Uuid;

use super::types::{Account, EntryKind, LedgerEntry, SubscriptionEvent, SubscriptionPlan};
use crate::error::LedgerError;

/// Tokens granted to a newly created account
pub const SIGNUP_GRANT_TOKENS: i64 = 5;

/// Hard cap on audit history page size
pub const MAX_HISTORY_LIMIT: usize = 50;

/// SQLite-backed ledger store
pub struct LedgerStore {
    conn: Mutex<Connection>,
    /// Fault-injection switch so tests can exercise the refund-failure path
    #[cfg(test)]
    fail_refunds: std::sync::atomic::AtomicBool,
}

impl LedgerStore {
    /// Create or open the ledger database at `~/.config/tokenledger/ledger.db`
    pub fn new() -> Result<Self, LedgerError> {
        let db_path = Self::default_db_path()?;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::open(&db_path)
    }

    /// Open a ledger database at an explicit path
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory ledger, used as a test double by hosts and tests
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                token_balance INTEGER NOT NULL DEFAULT 0 CHECK (token_balance >= 0),
                subscription_plan TEXT NOT NULL DEFAULT 'free',
                subscription_valid_until TEXT,
                last_video_watch_date TEXT,
                watched_videos_today INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS ledger_entries (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_account
                ON ledger_entries(account_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS subscription_events (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                old_plan TEXT NOT NULL,
                new_plan TEXT NOT NULL,
                valid_until TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sub_events_account
                ON subscription_events(account_id, created_at DESC);
        "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            #[cfg(test)]
            fail_refunds: std::sync::atomic::AtomicBool::new(false),
        })
    }

    fn default_db_path() -> Result<PathBuf, LedgerError> {
        dirs::config_dir()
            .map(|d| d.join("tokenledger").join("ledger.db"))
            .ok_or_else(|| {
                LedgerError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no config directory",
                ))
            })
    }

    /// Make every refund delta fail, for exercising the retry path
    #[cfg(test)]
    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Create an account with its signup grant and matching audit entry.
    /// Fails on a duplicate id (primary key constraint).
    pub fn create_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO accounts (id, token_balance, subscription_plan) VALUES (?1, ?2, 'free')",
            params![account_id, SIGNUP_GRANT_TOKENS],
        )?;
        insert_entry(
            &tx,
            account_id,
            SIGNUP_GRANT_TOKENS,
            EntryKind::Grant,
            "signup grant",
        )?;

        let account = fetch_account(&tx, account_id)?;
        tx.commit()?;

        debug!(account = account_id, "Created account");
        Ok(account)
    }

    /// Get an account by id
    pub fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let conn = self.conn.lock().unwrap();
        fetch_account(&conn, account_id)
    }

    /// Apply a signed balance change and append the matching audit entry
    /// as one atomic unit.
    ///
    /// Negative amounts are rejected with `InsufficientTokens` when they
    /// would drive the balance below zero; positive amounts always succeed.
    pub fn apply_delta(
        &self,
        account_id: &str,
        amount: i64,
        kind: EntryKind,
        description: &str,
    ) -> Result<Account, LedgerError> {
        #[cfg(test)]
        if kind == EntryKind::Refund
            && self.fail_refunds.load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(LedgerError::Storage(rusqlite::Error::InvalidQuery));
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Conditional update: the balance check and the write are one
        // statement, so two concurrent debits cannot both pass the check.
        let changed = tx.execute(
            "UPDATE accounts SET token_balance = token_balance + ?1
             WHERE id = ?2 AND token_balance + ?1 >= 0",
            params![amount, account_id],
        )?;

        if changed == 0 {
            // Distinguish a missing account from an unaffordable debit
            let account = fetch_account(&tx, account_id)?;
            return Err(LedgerError::InsufficientTokens {
                needed: -amount,
                available: account.token_balance,
            });
        }

        insert_entry(&tx, account_id, amount, kind, description)?;
        let account = fetch_account(&tx, account_id)?;
        tx.commit()?;

        debug!(
            account = account_id,
            amount,
            kind = kind.as_str(),
            balance = account.token_balance,
            "Applied ledger delta"
        );

        if cfg!(debug_assertions) {
            check_reconciled(&conn, &account);
        }

        Ok(account)
    }

    /// Grant the daily reward if the per-day cap allows it.
    ///
    /// The counter bump, the date write, the balance credit, and the reward
    /// audit entry commit as one unit. A stale `last_video_watch_date`
    /// counts as zero claims (lazy reset on read, no scheduled job).
    pub fn claim_daily_reward(
        &self,
        account_id: &str,
        today: NaiveDate,
        reward: i64,
        cap: u32,
    ) -> Result<Account, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let account = fetch_account(&tx, account_id)?;
        let used = account.claims_on(today);
        if used >= cap {
            return Err(LedgerError::QuotaExceeded { used, cap });
        }

        tx.execute(
            "UPDATE accounts SET token_balance = token_balance + ?1,
                    watched_videos_today = ?2,
                    last_video_watch_date = ?3
             WHERE id = ?4",
            params![reward, used + 1, today.format("%Y-%m-%d").to_string(), account_id],
        )?;
        insert_entry(&tx, account_id, reward, EntryKind::Reward, "daily video reward")?;

        let account = fetch_account(&tx, account_id)?;
        tx.commit()?;

        debug!(
            account = account_id,
            claims = account.watched_videos_today,
            balance = account.token_balance,
            "Granted daily reward"
        );
        Ok(account)
    }

    /// Change the stored subscription plan and append the audit event
    pub fn set_subscription(
        &self,
        account_id: &str,
        new_plan: SubscriptionPlan,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<Account, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let old = fetch_account(&tx, account_id)?;

        tx.execute(
            "UPDATE accounts SET subscription_plan = ?1, subscription_valid_until = ?2
             WHERE id = ?3",
            params![
                new_plan.as_str(),
                valid_until.map(|t| t.to_rfc3339()),
                account_id
            ],
        )?;
        tx.execute(
            "INSERT INTO subscription_events (id, account_id, old_plan, new_plan, valid_until, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                account_id,
                old.subscription_plan.as_str(),
                new_plan.as_str(),
                valid_until.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339()
            ],
        )?;

        let account = fetch_account(&tx, account_id)?;
        tx.commit()?;

        debug!(
            account = account_id,
            old = old.subscription_plan.as_str(),
            new = new_plan.as_str(),
            "Changed subscription plan"
        );
        Ok(account)
    }

    /// Audit history for an account, most recent first, capped at
    /// `MAX_HISTORY_LIMIT`
    pub fn history(
        &self,
        account_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let limit = limit.unwrap_or(MAX_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);

        let mut stmt = conn.prepare(
            "SELECT id, account_id, amount, kind, description, created_at
             FROM ledger_entries WHERE account_id = ?1
             ORDER BY rowid DESC LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![account_id, limit as i64], map_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Subscription change history, most recent first
    pub fn subscription_events(
        &self,
        account_id: &str,
    ) -> Result<Vec<SubscriptionEvent>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, account_id, old_plan, new_plan, valid_until, created_at
             FROM subscription_events WHERE account_id = ?1
             ORDER BY rowid DESC",
        )?;
        let events = stmt
            .query_map(params![account_id], map_subscription_event)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Sum of all audit entry amounts for an account. Reconciliation
    /// invariant: this always equals the account's balance.
    pub fn ledger_sum(&self, account_id: &str) -> Result<i64, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let sum = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(sum)
    }
}

/// Fetch an account inside the current transaction/connection
fn fetch_account(conn: &Connection, account_id: &str) -> Result<Account, LedgerError> {
    conn.query_row(
        "SELECT id, token_balance, subscription_plan, subscription_valid_until,
                last_video_watch_date, watched_videos_today
         FROM accounts WHERE id = ?1",
        params![account_id],
        map_account,
    )
    .optional()?
    .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
}

/// Append one immutable audit entry. Entries are never updated or deleted;
/// corrections are compensating entries.
fn insert_entry(
    conn: &Connection,
    account_id: &str,
    amount: i64,
    kind: EntryKind,
    description: &str,
) -> Result<(), LedgerError> {
    conn.execute(
        "INSERT INTO ledger_entries (id, account_id, amount, kind, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            account_id,
            amount,
            kind.as_str(),
            description,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn map_account(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        token_balance: row.get(1)?,
        subscription_plan: parse_plan(row.get::<_, String>(2)?, 2)?,
        subscription_valid_until: row
            .get::<_, Option<String>>(3)?
            .map(|s| parse_utc(&s, 3))
            .transpose()?,
        last_video_watch_date: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_date(&s, 4))
            .transpose()?,
        watched_videos_today: row.get(5)?,
    })
}

fn map_entry(row: &Row) -> rusqlite::Result<LedgerEntry> {
    let kind: String = row.get(3)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        kind: EntryKind::parse(&kind).ok_or_else(|| conversion_error(3, "unknown entry kind"))?,
        description: row.get(4)?,
        created_at: parse_utc(&row.get::<_, String>(5)?, 5)?,
    })
}

fn map_subscription_event(row: &Row) -> rusqlite::Result<SubscriptionEvent> {
    Ok(SubscriptionEvent {
        id: row.get(0)?,
        account_id: row.get(1)?,
        old_plan: parse_plan(row.get::<_, String>(2)?, 2)?,
        new_plan: parse_plan(row.get::<_, String>(3)?, 3)?,
        valid_until: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_utc(&s, 4))
            .transpose()?,
        created_at: parse_utc(&row.get::<_, String>(5)?, 5)?,
    })
}

fn parse_plan(value: String, idx: usize) -> rusqlite::Result<SubscriptionPlan> {
    SubscriptionPlan::parse(&value).ok_or_else(|| conversion_error(idx, "unknown plan"))
}

fn parse_utc(value: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_date(value: &str, idx: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        message.to_string().into(),
    )
}

/// Debug-build check that balance and audit trail still reconcile
fn check_reconciled(conn: &Connection, account: &Account) {
    let sum: Result<i64, _> = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ?1",
        params![account.id],
        |row| row.get(0),
    );
    if let Ok(sum) = sum {
        if sum != account.token_balance {
            error!(
                account = account.id,
                balance = account.token_balance,
                ledger_sum = sum,
                "Ledger does not reconcile with balance"
            );
        }
    }
}
