use crate::error::{CertError, Result};
use crate::owner::{NewOwner, Owner, OwnerForm};
use crate::routing::{EntityKind, StoreRole, StoreRouting};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const OWNER_COLUMNS: &str = "id, owner_name, father_name, mobile_no, address,
    vehicle_no, vehicle_model, chassis_no, engine_no, today_date, metadata";

/// Record Store Adapter: one SQLite database, exclusively owned
pub struct RecordStore {
    role: StoreRole,
    conn: Mutex<Connection>,
}

impl RecordStore {
    pub fn open(path: &Path, role: StoreRole) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        info!(store = %role, path = %path.display(), "opened record store");
        Ok(Self::from_connection(conn, role))
    }

    pub fn open_in_memory(role: StoreRole) -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?, role))
    }

    pub fn from_connection(conn: Connection, role: StoreRole) -> Self {
        Self {
            role,
            conn: Mutex::new(conn),
        }
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CertError::StoreUnavailable(self.role))
    }

    /// Run `f` against the underlying connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    // ========================================================================
    // SCHEMA
    // ========================================================================

    /// Create the tables this store carries according to `routing`
    pub fn migrate(&self, routing: &StoreRouting) -> Result<()> {
        let conn = self.lock()?;

        if routing.allow_migrate(self.role, EntityKind::Owner) {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS owners (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner_name TEXT NOT NULL,
                    father_name TEXT NOT NULL DEFAULT '',
                    mobile_no TEXT NOT NULL DEFAULT '',
                    address TEXT NOT NULL DEFAULT '',
                    vehicle_no TEXT NOT NULL,
                    vehicle_model TEXT NOT NULL DEFAULT '',
                    chassis_no TEXT NOT NULL DEFAULT '',
                    engine_no TEXT NOT NULL DEFAULT '',
                    today_date TEXT NOT NULL,
                    metadata TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_owners_vehicle_no ON owners(vehicle_no)",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_owners_today_date ON owners(today_date)",
                [],
            )?;
        }

        if routing.allow_migrate(self.role, EntityKind::User) {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
        }

        info!(store = %self.role, "schema ready");
        Ok(())
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn all_owners(&self) -> Result<Vec<Owner>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM owners ORDER BY id",
            OWNER_COLUMNS
        ))?;

        let owners = stmt
            .query_map([], owner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(store = %self.role, count = owners.len(), "loaded all owners");
        Ok(owners)
    }

    /// `None` when the id does not exist in this store
    pub fn get_owner(&self, id: i64) -> Result<Option<Owner>> {
        let conn = self.lock()?;
        let owner = conn
            .query_row(
                &format!("SELECT {} FROM owners WHERE id = ?1", OWNER_COLUMNS),
                [id],
                owner_from_row,
            )
            .optional()?;

        Ok(owner)
    }

    /// Case-insensitive substring match on vehicle number
    pub fn search_vehicle(&self, needle: &str) -> Result<Vec<Owner>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM owners
             WHERE instr(lower(vehicle_no), lower(?1)) > 0
             ORDER BY id",
            OWNER_COLUMNS
        ))?;

        let owners = stmt
            .query_map([needle], owner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(store = %self.role, needle, count = owners.len(), "vehicle search");
        Ok(owners)
    }

    /// Owners registered within `[from, to]`, both ends inclusive
    pub fn owners_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Owner>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM owners
             WHERE today_date BETWEEN ?1 AND ?2
             ORDER BY id",
            OWNER_COLUMNS
        ))?;

        let owners = stmt
            .query_map(params![from, to], owner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(store = %self.role, %from, %to, count = owners.len(), "date range search");
        Ok(owners)
    }

    pub fn count_owners(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM owners", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert one owner, returning it with the assigned id
    pub fn insert_owner(&self, owner: &NewOwner) -> Result<Owner> {
        let id = self.insert_row(None, owner)?;
        info!(store = %self.role, id, vehicle_no = %owner.vehicle_no, "owner created");
        Ok(owner.clone().into_owner(id))
    }

    /// Insert with an explicit id, for seeding colliding ids in tests
    #[cfg(test)]
    pub(crate) fn insert_owner_with_id(&self, id: i64, owner: &NewOwner) -> Result<Owner> {
        let id = self.insert_row(Some(id), owner)?;
        Ok(owner.clone().into_owner(id))
    }

    fn insert_row(&self, id: Option<i64>, owner: &NewOwner) -> Result<i64> {
        let metadata_json = if owner.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&owner.metadata)?)
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO owners (
                id, owner_name, father_name, mobile_no, address,
                vehicle_no, vehicle_model, chassis_no, engine_no, today_date, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                owner.owner_name,
                owner.father_name,
                owner.mobile_no,
                owner.address,
                owner.vehicle_no,
                owner.vehicle_model,
                owner.chassis_no,
                owner.engine_no,
                owner.today_date,
                metadata_json,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }
}

fn owner_from_row(row: &Row<'_>) -> rusqlite::Result<Owner> {
    let metadata_json: Option<String> = row.get(10)?;
    let metadata = match metadata_json {
        Some(json_str) => serde_json::from_str(&json_str).unwrap_or_default(),
        None => HashMap::new(),
    };

    Ok(Owner {
        id: row.get(0)?,
        owner_name: row.get(1)?,
        father_name: row.get(2)?,
        mobile_no: row.get(3)?,
        address: row.get(4)?,
        vehicle_no: row.get(5)?,
        vehicle_model: row.get(6)?,
        chassis_no: row.get(7)?,
        engine_no: row.get(8)?,
        today_date: row.get(9)?,
        metadata,
    })
}

// ============================================================================
// STORE PAIR
// ============================================================================

/// Both adapters plus the routing table that was injected at startup
pub struct Stores {
    pub primary: RecordStore,
    pub secondary: RecordStore,
    pub routing: StoreRouting,
}

impl Stores {
    pub fn new(primary: RecordStore, secondary: RecordStore, routing: StoreRouting) -> Self {
        Self {
            primary,
            secondary,
            routing,
        }
    }

    /// Open both database files and apply the schema
    pub fn open(primary: &Path, secondary: &Path, routing: StoreRouting) -> Result<Self> {
        let stores = Self::new(
            RecordStore::open(primary, StoreRole::Primary)?,
            RecordStore::open(secondary, StoreRole::Secondary)?,
            routing,
        );
        stores.migrate()?;
        Ok(stores)
    }

    /// In-memory pair with schema applied, used by tests and demos
    pub fn in_memory() -> Result<Self> {
        let stores = Self::new(
            RecordStore::open_in_memory(StoreRole::Primary)?,
            RecordStore::open_in_memory(StoreRole::Secondary)?,
            StoreRouting::default(),
        );
        stores.migrate()?;
        Ok(stores)
    }

    pub fn get(&self, role: StoreRole) -> &RecordStore {
        match role {
            StoreRole::Primary => &self.primary,
            StoreRole::Secondary => &self.secondary,
        }
    }

    /// Lookup order used by the resolver: primary first
    pub fn lookup_order(&self) -> [&RecordStore; 2] {
        [&self.primary, &self.secondary]
    }

    pub fn for_entity(&self, kind: EntityKind) -> &RecordStore {
        self.get(self.routing.store_for(kind))
    }

    pub fn migrate(&self) -> Result<()> {
        self.primary.migrate(&self.routing)?;
        self.secondary.migrate(&self.routing)
    }

    /// Create an owner in whichever store owner writes are routed to
    pub fn create_owner(&self, owner: &NewOwner) -> Result<Owner> {
        self.for_entity(EntityKind::Owner).insert_owner(owner)
    }
}

// ============================================================================
// CSV IMPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub rejected: usize,
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<OwnerForm>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut forms = Vec::new();
    for result in rdr.deserialize() {
        let form: OwnerForm = result?;
        forms.push(form);
    }

    Ok(forms)
}

/// Validate and insert each row; invalid rows are logged and skipped
pub fn import_owners(stores: &Stores, forms: &[OwnerForm]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (index, form) in forms.iter().enumerate() {
        match form.validate() {
            Ok(mut owner) => {
                owner.set_provenance("csv_import");
                stores.create_owner(&owner)?;
                summary.inserted += 1;
            }
            Err(CertError::Validation(errors)) => {
                // +2: header row and 1-based line numbers
                warn!(line = index + 2, ?errors, "skipping invalid row");
                summary.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(inserted = summary.inserted, rejected = summary.rejected, "import finished");
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Helper to build a validated owner payload
    pub(crate) fn new_owner(name: &str, vehicle_no: &str, date: &str) -> NewOwner {
        OwnerForm {
            owner_name: name.to_string(),
            vehicle_no: vehicle_no.to_string(),
            today_date: date.to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn store() -> RecordStore {
        let store = RecordStore::open_in_memory(StoreRole::Primary).unwrap();
        store.migrate(&StoreRouting::default()).unwrap();
        store
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_insert_and_get_owner() {
        let store = store();
        let created = store
            .insert_owner(&new_owner("Asha", "KA01AB1234", "2024-01-10"))
            .unwrap();

        assert_eq!(created.id, 1);

        let fetched = store.get_owner(1).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.today_date, date("2024-01-10"));
        assert!(store.get_owner(2).unwrap().is_none());
    }

    #[test]
    fn test_metadata_survives_roundtrip() {
        let store = store();
        let mut owner = new_owner("Asha", "KA01AB1234", "2024-01-10");
        owner.set_provenance("form");

        let created = store.insert_owner(&owner).unwrap();
        let fetched = store.get_owner(created.id).unwrap().unwrap();

        assert_eq!(fetched.metadata.get("source"), Some(&serde_json::json!("form")));
    }

    #[test]
    fn test_search_vehicle_case_insensitive() {
        let store = store();
        store.insert_owner(&new_owner("A", "KA01AB1234", "2024-01-10")).unwrap();
        store.insert_owner(&new_owner("B", "MH12XY9999", "2024-01-11")).unwrap();
        store.insert_owner(&new_owner("C", "KA05AB0001", "2024-01-12")).unwrap();

        let hits = store.search_vehicle("ab").unwrap();
        let names: Vec<&str> = hits.iter().map(|o| o.owner_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);

        assert!(store.search_vehicle("zz").unwrap().is_empty());
    }

    #[test]
    fn test_search_vehicle_treats_wildcards_literally() {
        let store = store();
        store.insert_owner(&new_owner("A", "KA01AB1234", "2024-01-10")).unwrap();

        assert!(store.search_vehicle("%").unwrap().is_empty());
        assert!(store.search_vehicle("_").unwrap().is_empty());
    }

    #[test]
    fn test_owners_between_inclusive() {
        let store = store();
        store.insert_owner(&new_owner("Dec", "KA01AA0001", "2023-12-31")).unwrap();
        store.insert_owner(&new_owner("Start", "KA01AA0002", "2024-01-01")).unwrap();
        store.insert_owner(&new_owner("End", "KA01AA0003", "2024-01-31")).unwrap();
        store.insert_owner(&new_owner("Feb", "KA01AA0004", "2024-02-01")).unwrap();

        let hits = store
            .owners_between(date("2024-01-01"), date("2024-01-31"))
            .unwrap();
        let names: Vec<&str> = hits.iter().map(|o| o.owner_name.as_str()).collect();
        assert_eq!(names, vec!["Start", "End"]);
    }

    #[test]
    fn test_insert_with_explicit_id() {
        let store = store();
        let owner = store
            .insert_owner_with_id(42, &new_owner("X", "KA01AB1234", "2024-01-10"))
            .unwrap();

        assert_eq!(owner.id, 42);
        assert_eq!(store.count_owners().unwrap(), 1);
        assert!(store.get_owner(42).unwrap().is_some());
    }

    #[test]
    fn test_user_table_follows_routing() {
        let routing = StoreRouting::default();
        let secondary = RecordStore::open_in_memory(StoreRole::Secondary).unwrap();
        secondary.migrate(&routing).unwrap();

        let has_users: i64 = secondary
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();

        assert_eq!(has_users, 0);
    }

    #[test]
    fn test_create_owner_uses_routed_store() {
        let stores = Stores::new(
            RecordStore::open_in_memory(StoreRole::Primary).unwrap(),
            RecordStore::open_in_memory(StoreRole::Secondary).unwrap(),
            StoreRouting::new(StoreRole::Secondary, StoreRole::Primary),
        );
        stores.migrate().unwrap();

        stores
            .create_owner(&new_owner("Routed", "KA01AB1234", "2024-01-10"))
            .unwrap();

        assert_eq!(stores.primary.count_owners().unwrap(), 0);
        assert_eq!(stores.secondary.count_owners().unwrap(), 1);
    }

    #[test]
    fn test_csv_import_skips_invalid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owners.csv");
        std::fs::write(
            &path,
            "owner_name,vehicle_no,mobile_no,today_date\n\
             Asha,KA01AB1234,9876543210,2024-01-10\n\
             ,MH12XY9999,,2024-01-11\n\
             Vikram,TN09CD4321,,2024-02-01\n",
        )
        .unwrap();

        let stores = Stores::in_memory().unwrap();
        let forms = load_csv(&path).unwrap();
        assert_eq!(forms.len(), 3);

        let summary = import_owners(&stores, &forms).unwrap();
        assert_eq!(summary, ImportSummary { inserted: 2, rejected: 1 });
        assert_eq!(stores.primary.count_owners().unwrap(), 2);
        assert_eq!(stores.secondary.count_owners().unwrap(), 0);

        let imported = stores.primary.get_owner(1).unwrap().unwrap();
        assert_eq!(
            imported.metadata.get("source"),
            Some(&serde_json::json!("csv_import"))
        );
    }
}
