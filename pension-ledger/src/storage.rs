//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `entries` - Append-only entry log (key: entry_id)
//! - `users` - User registry (key: user_id)
//! - `employers` - Employer registry (key: employer_id)
//! - `indices` - Secondary indices for fast lookups
//! - `meta` - Store metadata (sequence counter)
//!
//! # Index key layouts
//!
//! - `u || user_id(16) || created_at_nanos_be(8) || seq_be(8)` -> entry_id:
//!   per-user scan in (created_at, seq) order
//! - `t || token || '|' || entry_id(16)` -> empty: correlation-token pairing
//! - `e || email` -> user_id: unique-email lookup
//! - `o || user_id(16)` -> employer_id: employer by operating account
//!
//! Every mutating write is a single synchronous `WriteBatch`, so a
//! transfer's debit and credit (or a contribution's three entries) become
//! durable and visible together or not at all.

use crate::{
    error::{Error, Result},
    types::{
        Employer, EmployerPatch, Entry, EntryQuery, NewEmployer, NewEntry, NewUser, User,
        UserPatch,
    },
    Config,
};
use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode,
    Options, WriteBatch, DB,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_USERS: &str = "users";
const CF_EMPLOYERS: &str = "employers";
const CF_INDICES: &str = "indices";
const CF_META: &str = "meta";

const META_NEXT_SEQ: &[u8] = b"next_seq";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,

    /// Next entry sequence number; persisted in `meta` within the same
    /// batch as each append
    next_seq: AtomicU64,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for an append-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_registry()),
            ColumnFamilyDescriptor::new(CF_EMPLOYERS, Self::cf_options_registry()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_registry()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let next_seq = {
            let cf = db
                .cf_handle(CF_META)
                .ok_or_else(|| Error::Storage("Column family meta not found".to_string()))?;
            match db.get_cf(&cf, META_NEXT_SEQ)? {
                Some(bytes) => {
                    let raw: [u8; 8] = bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| Error::Storage("Corrupt sequence counter".to_string()))?;
                    u64::from_be_bytes(raw)
                }
                None => 0,
            }
        };

        tracing::info!(path = %path.display(), next_seq, "Opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            next_seq: AtomicU64::new(next_seq),
        })
    }

    // Column family options

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_registry() -> Options {
        let mut opts = Options::default();
        // Registries are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Entry operations

    /// Append a single entry
    pub fn append_entry(&self, input: NewEntry) -> Result<Entry> {
        let mut stored = self.append_entries(vec![input])?;
        Ok(stored.remove(0))
    }

    /// Append a batch of entries as one atomic unit
    ///
    /// This is the atomicity primitive for transfer pairs and contribution
    /// triples: either every entry (with its index keys) becomes durable
    /// and visible, or none does. The store assigns `id`, `seq`, and
    /// `created_at` (when absent).
    pub fn append_entries(&self, inputs: Vec<NewEntry>) -> Result<Vec<Entry>> {
        for input in &inputs {
            if input.amount < Decimal::ZERO {
                return Err(Error::Validation(format!(
                    "Entry amount must be non-negative, got {}",
                    input.amount
                )));
            }
        }

        let cf_entries = self.cf(CF_ENTRIES)?;
        let cf_indices = self.cf(CF_INDICES)?;
        let cf_meta = self.cf(CF_META)?;

        let mut batch = WriteBatch::default();
        let mut stored = Vec::with_capacity(inputs.len());

        for input in inputs {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            let entry = Entry {
                id: Uuid::now_v7(),
                seq,
                user_id: input.user_id,
                amount: input.amount,
                employer_match: input.employer_match,
                kind: input.kind,
                payment_method: input.payment_method,
                tx_token: input.tx_token,
                employer_id: input.employer_id,
                note: input.note,
                created_at: input.created_at.unwrap_or_else(Utc::now),
            };

            batch.put_cf(&cf_entries, entry.id.as_bytes(), bincode::serialize(&entry)?);
            batch.put_cf(
                &cf_indices,
                Self::index_key_user_entry(&entry),
                entry.id.as_bytes(),
            );
            if let Some(token) = &entry.tx_token {
                batch.put_cf(&cf_indices, Self::index_key_token_entry(token, entry.id), b"");
            }

            stored.push(entry);
        }

        if let Some(last) = stored.last() {
            batch.put_cf(&cf_meta, META_NEXT_SEQ, (last.seq + 1).to_be_bytes());
        }

        self.db.write(batch)?;

        for entry in &stored {
            tracing::debug!(
                entry_id = %entry.id,
                user_id = %entry.user_id,
                kind = %entry.kind,
                amount = %entry.amount,
                "Entry appended"
            );
        }

        Ok(stored)
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<Entry> {
        let cf = self.cf(CF_ENTRIES)?;
        let value = self
            .db
            .get_cf(&cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("entry {}", entry_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Entries for a user, sorted by `created_at` descending with `seq`
    /// descending as the stable tie-break
    pub fn entries_for_user(&self, user_id: Uuid, query: &EntryQuery) -> Result<Vec<Entry>> {
        let cf_indices = self.cf(CF_INDICES)?;

        let prefix = Self::index_prefix_user(user_id);
        let iter = self
            .db
            .iterator_cf(&cf_indices, IteratorMode::From(&prefix, Direction::Forward));

        // The index key encodes (created_at, seq) big-endian, so a forward
        // scan yields ascending order; reverse for the descending contract.
        let mut entry_ids = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id_bytes: [u8; 16] = value
                .as_ref()
                .try_into()
                .map_err(|_| Error::Storage("Corrupt user-entry index value".to_string()))?;
            entry_ids.push(Uuid::from_bytes(id_bytes));
        }
        entry_ids.reverse();

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for entry_id in entry_ids {
            let entry = self.get_entry(entry_id)?;
            if !query.matches(&entry) {
                continue;
            }
            if skipped < query.offset {
                skipped += 1;
                continue;
            }
            entries.push(entry);
            if let Some(limit) = query.limit {
                if entries.len() >= limit {
                    break;
                }
            }
        }

        Ok(entries)
    }

    /// Entries sharing a correlation token (via the token index)
    pub fn entries_for_token(&self, token: &str) -> Result<Vec<Entry>> {
        let cf_indices = self.cf(CF_INDICES)?;

        let prefix = Self::index_prefix_token(token);
        let iter = self
            .db
            .iterator_cf(&cf_indices, IteratorMode::From(&prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id_bytes: [u8; 16] = key[prefix.len()..]
                .try_into()
                .map_err(|_| Error::Storage("Corrupt token index key".to_string()))?;
            entries.push(self.get_entry(Uuid::from_bytes(id_bytes))?);
        }

        Ok(entries)
    }

    // User operations

    /// Register a new user; fails on duplicate email
    pub fn create_user(&self, input: NewUser) -> Result<User> {
        let cf_users = self.cf(CF_USERS)?;
        let cf_indices = self.cf(CF_INDICES)?;

        let email_key = Self::index_key_email(&input.email);
        if self.db.get_cf(&cf_indices, &email_key)?.is_some() {
            return Err(Error::DuplicateEmail(input.email));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            name: input.name,
            age: input.age,
            income: None,
            risk_profile: None,
            role: input.role,
            current_employer_id: None,
            wallet_address: None,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, user.id.as_bytes(), bincode::serialize(&user)?);
        batch.put_cf(&cf_indices, &email_key, user.id.as_bytes());
        self.db.write(batch)?;

        tracing::info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(user)
    }

    /// Get user by ID
    pub fn find_user(&self, user_id: Uuid) -> Result<User> {
        let cf = self.cf(CF_USERS)?;
        let value = self
            .db
            .get_cf(&cf, user_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get user by email (via index)
    pub fn find_user_by_email(&self, email: &str) -> Result<User> {
        let cf_indices = self.cf(CF_INDICES)?;
        let value = self
            .db
            .get_cf(&cf_indices, Self::index_key_email(email))?
            .ok_or_else(|| Error::NotFound(format!("user {}", email)))?;
        let id_bytes: [u8; 16] = value
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("Corrupt email index value".to_string()))?;
        self.find_user(Uuid::from_bytes(id_bytes))
    }

    /// Resolve a user from an id-or-email selector
    pub fn resolve_user(&self, selector: &str) -> Result<User> {
        match Uuid::parse_str(selector) {
            Ok(id) => self.find_user(id),
            Err(_) => self.find_user_by_email(selector),
        }
    }

    /// All users except the given one (recipient pickers)
    pub fn list_users_except(&self, user_id: Uuid) -> Result<Vec<User>> {
        let cf = self.cf(CF_USERS)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut users = Vec::new();
        for item in iter {
            let (_, value) = item?;
            let user: User = bincode::deserialize(&value)?;
            if user.id != user_id {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Patch mutable profile fields; entries are never touched
    pub fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User> {
        let cf = self.cf(CF_USERS)?;
        let mut user = self.find_user(user_id)?;
        patch.apply(&mut user);
        self.db
            .put_cf(&cf, user.id.as_bytes(), bincode::serialize(&user)?)?;
        Ok(user)
    }

    // Employer operations

    /// Onboard a new employer
    pub fn create_employer(&self, input: NewEmployer) -> Result<Employer> {
        Self::validate_match_percentage(input.match_percentage)?;
        // The operating account must exist
        let owner = self.find_user(input.user_id)?;

        let cf_employers = self.cf(CF_EMPLOYERS)?;
        let cf_indices = self.cf(CF_INDICES)?;

        let employer = Employer {
            id: Uuid::new_v4(),
            company_name: input.company_name,
            match_percentage: input.match_percentage,
            user_id: owner.id,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_employers,
            employer.id.as_bytes(),
            bincode::serialize(&employer)?,
        );
        batch.put_cf(
            &cf_indices,
            Self::index_key_employer_owner(owner.id),
            employer.id.as_bytes(),
        );
        self.db.write(batch)?;

        tracing::info!(
            employer_id = %employer.id,
            company = %employer.company_name,
            "Employer onboarded"
        );
        Ok(employer)
    }

    /// Get employer by ID
    pub fn find_employer(&self, employer_id: Uuid) -> Result<Employer> {
        let cf = self.cf(CF_EMPLOYERS)?;
        let value = self
            .db
            .get_cf(&cf, employer_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("employer {}", employer_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get employer by operating account (via index)
    pub fn find_employer_by_owner(&self, user_id: Uuid) -> Result<Employer> {
        let cf_indices = self.cf(CF_INDICES)?;
        let value = self
            .db
            .get_cf(&cf_indices, Self::index_key_employer_owner(user_id))?
            .ok_or_else(|| Error::NotFound(format!("employer for user {}", user_id)))?;
        let id_bytes: [u8; 16] = value
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("Corrupt employer index value".to_string()))?;
        self.find_employer(Uuid::from_bytes(id_bytes))
    }

    /// Patch mutable employer fields
    pub fn update_employer(&self, employer_id: Uuid, patch: EmployerPatch) -> Result<Employer> {
        if let Some(pct) = patch.match_percentage {
            Self::validate_match_percentage(pct)?;
        }
        let cf = self.cf(CF_EMPLOYERS)?;
        let mut employer = self.find_employer(employer_id)?;
        patch.apply(&mut employer);
        self.db
            .put_cf(&cf, employer.id.as_bytes(), bincode::serialize(&employer)?)?;
        Ok(employer)
    }

    fn validate_match_percentage(pct: Decimal) -> Result<()> {
        if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(Error::Validation(format!(
                "Match percentage must be within 0-100, got {}",
                pct
            )));
        }
        Ok(())
    }

    // Index key helpers

    fn index_prefix_user(user_id: Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(17);
        key.push(b'u');
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    fn index_key_user_entry(entry: &Entry) -> Vec<u8> {
        let mut key = Self::index_prefix_user(entry.user_id);
        let nanos = entry.created_at.timestamp_nanos_opt().unwrap_or(0);
        key.extend_from_slice(&nanos.to_be_bytes());
        key.extend_from_slice(&entry.seq.to_be_bytes());
        key
    }

    fn index_prefix_token(token: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(token.len() + 2);
        key.push(b't');
        key.extend_from_slice(token.as_bytes());
        key.push(b'|');
        key
    }

    fn index_key_token_entry(token: &str, entry_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix_token(token);
        key.extend_from_slice(entry_id.as_bytes());
        key
    }

    fn index_key_email(email: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(email.len() + 1);
        key.push(b'e');
        key.extend_from_slice(email.to_ascii_lowercase().as_bytes());
        key
    }

    fn index_key_employer_owner(user_id: Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(17);
        key.push(b'o');
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    // Statistics

    /// Approximate entry count (RocksDB estimate)
    pub fn approximate_entry_count(&self) -> Result<u64> {
        let cf = self.cf(CF_ENTRIES)?;
        let prop = self
            .db
            .property_int_value_cf(&cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}
