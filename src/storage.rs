//! JSON-file persistence for every table the tracker uses.
//!
//! The whole [`Database`] lives in memory behind a mutex. Reads filter the
//! in-memory copy; writes are applied to a clone, flushed to disk, and only
//! then swapped in, so a failed write never leaves half-applied state behind.

use crate::models::{
    Database, Expense, ExpenseCategory, Note, Profile, ProteinEntry, ProteinFood, UserRole,
    WaterEntry,
};
use crate::seed::seed_reference_data;
use chrono::{DateTime, NaiveDate, Utc};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found in {table}")]
    NotFound { table: &'static str },
    #[error("record conflicts with an existing row in {table}")]
    Conflict { table: &'static str },
    #[error("failed to write data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode data file: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A record type stored in one of the [`Database`] tables.
pub trait Table: Clone + Send + Sync + 'static {
    const NAME: &'static str;

    fn id(&self) -> Uuid;

    /// Owning user; `None` for reference data.
    fn owner(&self) -> Option<Uuid> {
        None
    }

    fn date(&self) -> Option<NaiveDate> {
        None
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn rows(db: &Database) -> &Vec<Self>;

    fn rows_mut(db: &mut Database) -> &mut Vec<Self>;

    /// Uniqueness constraint beyond the primary key.
    fn conflicts_with(&self, _other: &Self) -> bool {
        false
    }
}

impl Table for Expense {
    const NAME: &'static str = "expenses";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.expenses
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.expenses
    }
}

impl Table for ProteinEntry {
    const NAME: &'static str = "protein_entries";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.protein_entries
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.protein_entries
    }
}

impl Table for WaterEntry {
    const NAME: &'static str = "water_entries";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.water_entries
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.water_entries
    }
}

impl Table for Note {
    const NAME: &'static str = "notes";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.notes
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.notes
    }
}

impl Table for ExpenseCategory {
    const NAME: &'static str = "expense_categories";

    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.expense_categories
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.expense_categories
    }
}

impl Table for ProteinFood {
    const NAME: &'static str = "protein_foods";

    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.protein_foods
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.protein_foods
    }
}

impl Table for UserRole {
    const NAME: &'static str = "user_roles";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.user_roles
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.user_roles
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.user_id == other.user_id && self.role == other.role
    }
}

impl Table for Profile {
    const NAME: &'static str = "profiles";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<Uuid> {
        Some(self.user_id)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn rows(db: &Database) -> &Vec<Self> {
        &db.profiles
    }

    fn rows_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.profiles
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.user_id == other.user_id || self.email.eq_ignore_ascii_case(&other.email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    On(NaiveDate),
    /// Inclusive on both ends.
    Between(NaiveDate, NaiveDate),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Filter {
    owner: Option<Uuid>,
    date: Option<DateFilter>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            date: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(DateFilter::On(date));
        self
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date = Some(DateFilter::Between(start, end));
        self
    }

    pub fn matches<T: Table>(&self, row: &T) -> bool {
        if let Some(owner) = self.owner {
            if row.owner() != Some(owner) {
                return false;
            }
        }

        match (self.date, row.date()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(DateFilter::On(day)), Some(date)) => date == day,
            (Some(DateFilter::Between(start, end)), Some(date)) => start <= date && date <= end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Inserted,
    OldestFirst,
    NewestFirst,
}

impl Order {
    fn apply<T: Table>(self, rows: &mut [T]) {
        match self {
            Order::Inserted => {}
            Order::OldestFirst => rows.sort_by_key(|row| row.created_at()),
            Order::NewestFirst => {
                rows.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
            }
        }
    }
}

#[derive(Clone)]
pub struct Store {
    path: PathBuf,
    data: Arc<Mutex<Database>>,
}

impl Store {
    /// Loads the data file (or starts empty) and seeds missing reference data.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut data = load_data(&path).await;
        if seed_reference_data(&mut data) {
            info!(
                categories = data.expense_categories.len(),
                foods = data.protein_foods.len(),
                "seeded reference data"
            );
            persist_data(&path, &data).await?;
        }

        Ok(Self {
            path,
            data: Arc::new(Mutex::new(data)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list<T: Table>(&self, filter: &Filter, order: Order) -> Vec<T> {
        let data = self.data.lock().await;
        let mut rows: Vec<T> = T::rows(&data)
            .iter()
            .filter(|row| filter.matches(*row))
            .cloned()
            .collect();
        order.apply(&mut rows);
        rows
    }

    pub async fn find<T: Table>(&self, id: Uuid, filter: &Filter) -> Option<T> {
        let data = self.data.lock().await;
        T::rows(&data)
            .iter()
            .find(|row| row.id() == id && filter.matches(*row))
            .cloned()
    }

    pub async fn insert<T: Table>(&self, record: T) -> Result<T, StoreError> {
        let inserted = self.write(move |db| insert_row(db, record)).await?;
        debug!(table = T::NAME, id = %inserted.id(), "inserted record");
        Ok(inserted)
    }

    /// Patches the row with `id` that is visible through `filter`.
    pub async fn update<T, F>(&self, id: Uuid, filter: &Filter, patch: F) -> Result<T, StoreError>
    where
        T: Table,
        F: FnOnce(&mut T) + Send,
    {
        let filter = *filter;
        self.write(move |db| {
            let row = T::rows_mut(db)
                .iter_mut()
                .find(|row| row.id() == id && filter.matches(&**row))
                .ok_or(StoreError::NotFound { table: T::NAME })?;
            patch(row);
            Ok(row.clone())
        })
        .await
    }

    pub async fn delete<T: Table>(&self, id: Uuid, filter: &Filter) -> Result<(), StoreError> {
        let filter = *filter;
        self.write(move |db| {
            let rows = T::rows_mut(db);
            let before = rows.len();
            rows.retain(|row| !(row.id() == id && filter.matches(row)));
            if rows.len() == before {
                return Err(StoreError::NotFound { table: T::NAME });
            }
            Ok(())
        })
        .await
    }

    pub async fn delete_where<T, P>(&self, predicate: P) -> Result<usize, StoreError>
    where
        T: Table,
        P: Fn(&T) -> bool + Send,
    {
        self.write(move |db| Ok(delete_rows(db, predicate))).await
    }

    /// Applies several changes, possibly across tables, as one write: either
    /// all of them are persisted or none is.
    pub async fn transaction<R, F>(&self, apply: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<R, StoreError> + Send,
    {
        self.write(move |db| apply(&mut Batch { db })).await
    }

    async fn write<R, F>(&self, apply: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Database) -> Result<R, StoreError> + Send,
    {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let output = apply(&mut next)?;
        persist_data(&self.path, &next).await?;
        *data = next;
        Ok(output)
    }
}

/// Pending changes inside [`Store::transaction`].
pub struct Batch<'a> {
    db: &'a mut Database,
}

impl Batch<'_> {
    pub fn insert<T: Table>(&mut self, record: T) -> Result<T, StoreError> {
        insert_row(self.db, record)
    }

    pub fn delete_where<T, P>(&mut self, predicate: P) -> usize
    where
        T: Table,
        P: Fn(&T) -> bool,
    {
        delete_rows(self.db, predicate)
    }
}

fn insert_row<T: Table>(db: &mut Database, record: T) -> Result<T, StoreError> {
    let rows = T::rows_mut(db);
    if rows
        .iter()
        .any(|row| row.id() == record.id() || row.conflicts_with(&record))
    {
        return Err(StoreError::Conflict { table: T::NAME });
    }
    rows.push(record.clone());
    Ok(record)
}

fn delete_rows<T, P>(db: &mut Database, predicate: P) -> usize
where
    T: Table,
    P: Fn(&T) -> bool,
{
    let rows = T::rows_mut(db);
    let before = rows.len();
    rows.retain(|row| !predicate(row));
    before - rows.len()
}

pub async fn load_data(path: &Path) -> Database {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                Database::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Database::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            Database::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &Database) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(data)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload).await.inspect_err(|err| {
        error!(path = %staging.display(), "failed to write data file: {err}");
    })?;
    fs::rename(&staging, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn unique_data_path(label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "daily_tracker_{label}_{}_{}",
            std::process::id(),
            nanos
        ));
        path.push("tracker.json");
        path
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn expense(owner: Uuid, item: &str, category: &str, amount: f64, on: &str) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            user_id: owner,
            item_name: item.into(),
            category: category.into(),
            amount,
            date: date(on),
            created_at: Utc::now(),
        }
    }

    fn role(user_id: Uuid, role: Role) -> UserRole {
        UserRole {
            id: Uuid::new_v4(),
            user_id,
            role,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn add_read_delete_round_trip() {
        let store = Store::open(unique_data_path("roundtrip")).await.unwrap();
        let owner = Uuid::new_v4();
        let day = date("2024-01-01");

        let tea = store
            .insert(expense(owner, "Tea", "tea", 20.0, "2024-01-01"))
            .await
            .unwrap();

        let today: Vec<Expense> = store
            .list(&Filter::owned_by(owner).on(day), Order::Inserted)
            .await;
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].amount, 20.0);
        assert_eq!(today[0].category, "tea");

        store
            .delete::<Expense>(tea.id, &Filter::owned_by(owner))
            .await
            .unwrap();
        let today: Vec<Expense> = store
            .list(&Filter::owned_by(owner).on(day), Order::Inserted)
            .await;
        assert!(today.is_empty());
    }

    #[tokio::test]
    async fn records_are_only_visible_to_their_owner() {
        let store = Store::open(unique_data_path("owner")).await.unwrap();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let row = store
            .insert(expense(owner, "Bus", "bus_fare", 15.0, "2024-02-03"))
            .await
            .unwrap();

        let seen: Vec<Expense> = store
            .list(&Filter::owned_by(stranger), Order::Inserted)
            .await;
        assert!(seen.is_empty());

        let err = store
            .delete::<Expense>(row.id, &Filter::owned_by(stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { table: "expenses" }));

        let still_there: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        assert_eq!(still_there.len(), 1);
    }

    #[tokio::test]
    async fn between_filter_is_inclusive() {
        let store = Store::open(unique_data_path("between")).await.unwrap();
        let owner = Uuid::new_v4();
        for day in ["2024-01-31", "2024-02-01", "2024-02-29", "2024-03-01"] {
            store
                .insert(expense(owner, "Milk", "milk", 30.0, day))
                .await
                .unwrap();
        }

        let february: Vec<Expense> = store
            .list(
                &Filter::owned_by(owner).between(date("2024-02-01"), date("2024-02-29")),
                Order::Inserted,
            )
            .await;
        let days: Vec<String> = february.iter().map(|e| e.date.to_string()).collect();
        assert_eq!(days, vec!["2024-02-01", "2024-02-29"]);
    }

    #[tokio::test]
    async fn duplicate_role_is_a_conflict() {
        let store = Store::open(unique_data_path("roles")).await.unwrap();
        let user = Uuid::new_v4();
        store.insert(role(user, Role::Admin)).await.unwrap();
        store.insert(role(user, Role::User)).await.unwrap();

        let err = store.insert(role(user, Role::Admin)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { table: "user_roles" }));

        let roles: Vec<UserRole> = store.list(&Filter::owned_by(user), Order::Inserted).await;
        assert_eq!(roles.len(), 2);
    }

    #[tokio::test]
    async fn update_patches_only_visible_rows() {
        let store = Store::open(unique_data_path("update")).await.unwrap();
        let owner = Uuid::new_v4();
        let row = store
            .insert(expense(owner, "Lunch", "lunch", 120.0, "2024-05-05"))
            .await
            .unwrap();

        let updated = store
            .update::<Expense, _>(row.id, &Filter::owned_by(owner), |e| e.amount = 150.0)
            .await
            .unwrap();
        assert_eq!(updated.amount, 150.0);

        let err = store
            .update::<Expense, _>(row.id, &Filter::owned_by(Uuid::new_v4()), |e| {
                e.amount = 0.0
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn newest_first_orders_by_creation_time() {
        let store = Store::open(unique_data_path("order")).await.unwrap();
        let owner = Uuid::new_v4();
        let mut first = expense(owner, "Breakfast", "breakfast", 60.0, "2024-01-01");
        first.created_at = "2024-01-01T07:00:00Z".parse().unwrap();
        let mut second = expense(owner, "Dinner", "dinner", 200.0, "2024-01-01");
        second.created_at = "2024-01-01T20:00:00Z".parse().unwrap();
        store.insert(second.clone()).await.unwrap();
        store.insert(first.clone()).await.unwrap();

        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::NewestFirst).await;
        assert_eq!(rows[0].id, second.id);
        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::OldestFirst).await;
        assert_eq!(rows[0].id, first.id);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let path = unique_data_path("reopen");
        let owner = Uuid::new_v4();
        {
            let store = Store::open(&path).await.unwrap();
            store
                .insert(expense(owner, "Book", "books", 399.0, "2024-06-01"))
                .await
                .unwrap();
        }

        let store = Store::open(&path).await.unwrap();
        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name, "Book");
    }

    #[tokio::test]
    async fn failed_write_leaves_state_unchanged() {
        let path = unique_data_path("failed");
        let store = Store::open(&path).await.unwrap();
        let owner = Uuid::new_v4();
        store
            .insert(expense(owner, "Tea", "tea", 20.0, "2024-01-01"))
            .await
            .unwrap();

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        let result = store
            .insert(expense(owner, "Coffee", "coffee", 40.0, "2024-01-01"))
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));

        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name, "Tea");
    }

    #[tokio::test]
    async fn transaction_commits_all_changes_together() {
        let store = Store::open(unique_data_path("batch")).await.unwrap();
        let owner = Uuid::new_v4();
        store
            .insert(expense(owner, "Tea", "tea", 20.0, "2024-01-01"))
            .await
            .unwrap();

        let removed = store
            .transaction(|batch| {
                batch.insert(role(owner, Role::User))?;
                Ok(batch.delete_where::<Expense, _>(|row| row.user_id == owner))
            })
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let roles: Vec<UserRole> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        assert_eq!(roles.len(), 1);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn transaction_error_discards_earlier_changes() {
        let store = Store::open(unique_data_path("batch_conflict")).await.unwrap();
        let owner = Uuid::new_v4();
        store
            .insert(expense(owner, "Tea", "tea", 20.0, "2024-01-01"))
            .await
            .unwrap();
        store.insert(role(owner, Role::Admin)).await.unwrap();

        let err = store
            .transaction(|batch| {
                batch.delete_where::<Expense, _>(|row| row.user_id == owner);
                batch.insert(role(owner, Role::Admin))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { table: "user_roles" }));

        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn failed_transaction_persist_keeps_every_table() {
        let path = unique_data_path("batch_io");
        let store = Store::open(&path).await.unwrap();
        let owner = Uuid::new_v4();
        store
            .insert(expense(owner, "Tea", "tea", 20.0, "2024-01-01"))
            .await
            .unwrap();

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        let result = store
            .transaction(|batch| {
                batch.delete_where::<Expense, _>(|row| row.user_id == owner);
                batch.insert(role(owner, Role::User))?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));

        let rows: Vec<Expense> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        let roles: Vec<UserRole> = store.list(&Filter::owned_by(owner), Order::Inserted).await;
        assert_eq!(rows.len(), 1);
        assert!(roles.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty_and_seeds_reference_data() {
        let path = unique_data_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let store = Store::open(&path).await.unwrap();
        let categories: Vec<ExpenseCategory> = store.list(&Filter::all(), Order::Inserted).await;
        let foods: Vec<ProteinFood> = store.list(&Filter::all(), Order::Inserted).await;
        assert!(!categories.is_empty());
        assert!(!foods.is_empty());
    }
}
