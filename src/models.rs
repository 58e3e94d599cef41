use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_name: String,
    pub category: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_name: String,
    pub quantity: f64,
    pub protein_amount: f64,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_ml: u32,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Checklist task or freeform note. Both live in the `notes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoteKind {
    #[default]
    Task,
    Note,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteKind::Task => "task",
            NoteKind::Note => "note",
        }
    }
}

// Unrecognised tags decode as tasks so aggregation never sees an unknown kind.
impl From<String> for NoteKind {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "note" => NoteKind::Note,
            _ => NoteKind::Task,
        }
    }
}

impl From<NoteKind> for String {
    fn from(kind: NoteKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub id: Uuid,
    pub name: String,
    pub emoji: String,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinFood {
    pub id: Uuid,
    pub name: String,
    pub protein_per_unit: f64,
    pub unit: String,
    pub sort_order: u32,
}

impl ProteinFood {
    pub fn protein_for(&self, quantity: f64) -> f64 {
        quantity * self.protein_per_unit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Database {
    pub expenses: Vec<Expense>,
    pub protein_entries: Vec<ProteinEntry>,
    pub water_entries: Vec<WaterEntry>,
    pub notes: Vec<Note>,
    pub expense_categories: Vec<ExpenseCategory>,
    pub protein_foods: Vec<ProteinFood>,
    pub user_roles: Vec<UserRole>,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
    pub day: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
