use crate::models::{Expense, Note, NoteKind, ProteinEntry, WaterEntry};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const PROTEIN_GOAL_G: f64 = 100.0;
pub const WATER_GOAL_ML: u32 = 4000;
pub const GLASS_ML: u32 = 250;
pub const RECENT_WATER_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub total: f64,
    pub goal: f64,
    /// Uncapped; can exceed 100.
    pub percentage: f64,
    /// Capped at 100 for progress bars.
    pub bar_percentage: f64,
    pub goal_met: bool,
    pub remaining: f64,
    pub exceeded_by: f64,
}

impl GoalProgress {
    pub fn new(total: f64, goal: f64) -> Self {
        let percentage = if goal > 0.0 { total * 100.0 / goal } else { 0.0 };
        Self {
            total,
            goal,
            percentage,
            bar_percentage: percentage.clamp(0.0, 100.0),
            goal_met: total >= goal,
            remaining: (goal - total).max(0.0),
            exceeded_by: (total - goal).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenseSummary {
    pub date: NaiveDate,
    pub total: f64,
    pub count: usize,
    pub by_category: Vec<CategoryTotal>,
    pub expenses: Vec<Expense>,
}

pub fn summarize_expenses(date: NaiveDate, expenses: Vec<Expense>) -> ExpenseSummary {
    let mut groups: BTreeMap<String, CategoryTotal> = BTreeMap::new();
    let mut total = 0.0;
    for expense in &expenses {
        total += expense.amount;
        let entry = groups
            .entry(expense.category.clone())
            .or_insert_with(|| CategoryTotal {
                category: expense.category.clone(),
                total: 0.0,
                count: 0,
            });
        entry.total += expense.amount;
        entry.count += 1;
    }

    ExpenseSummary {
        date,
        total,
        count: expenses.len(),
        by_category: groups.into_values().collect(),
        expenses,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodTotal {
    pub food_name: String,
    pub servings: usize,
    pub protein: f64,
    /// Removing "one serving" deletes this entry.
    pub latest_entry_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProteinSummary {
    pub date: NaiveDate,
    pub progress: GoalProgress,
    pub by_food: Vec<FoodTotal>,
    pub entries: Vec<ProteinEntry>,
}

/// `entries` are expected oldest first; the last entry per food is the latest.
pub fn summarize_protein(date: NaiveDate, entries: Vec<ProteinEntry>) -> ProteinSummary {
    let mut by_food: Vec<FoodTotal> = Vec::new();
    let mut total = 0.0;
    for entry in &entries {
        total += entry.protein_amount;
        match by_food.iter_mut().find(|f| f.food_name == entry.food_name) {
            Some(food) => {
                food.servings += 1;
                food.protein += entry.protein_amount;
                food.latest_entry_id = entry.id;
            }
            None => by_food.push(FoodTotal {
                food_name: entry.food_name.clone(),
                servings: 1,
                protein: entry.protein_amount,
                latest_entry_id: entry.id,
            }),
        }
    }

    ProteinSummary {
        date,
        progress: GoalProgress::new(total, PROTEIN_GOAL_G),
        by_food,
        entries,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaterSummary {
    pub date: NaiveDate,
    pub progress: GoalProgress,
    pub glasses: u32,
    pub glasses_goal: u32,
    pub glasses_to_goal: u32,
    pub recent: Vec<WaterEntry>,
    pub count: usize,
}

pub fn water_total(entries: &[WaterEntry]) -> u32 {
    entries
        .iter()
        .fold(0u32, |sum, e| sum.saturating_add(e.amount_ml))
}

/// `entries` are expected newest first.
pub fn summarize_water(date: NaiveDate, entries: Vec<WaterEntry>) -> WaterSummary {
    let total = water_total(&entries);
    let glasses = total / GLASS_ML;
    let glasses_goal = WATER_GOAL_ML / GLASS_ML;
    let count = entries.len();
    let mut recent = entries;
    recent.truncate(RECENT_WATER_LIMIT);

    WaterSummary {
        date,
        progress: GoalProgress::new(f64::from(total), f64::from(WATER_GOAL_ML)),
        glasses,
        glasses_goal,
        glasses_to_goal: glasses_goal.saturating_sub(glasses),
        recent,
        count,
    }
}

/// True when adding `added` ml moves the day's total across the goal.
pub fn crosses_water_goal(before: u32, added: u32) -> bool {
    before < WATER_GOAL_ML && before.saturating_add(added) >= WATER_GOAL_ML
}

#[derive(Debug, Clone, Serialize)]
pub struct NotesSummary {
    pub date: NaiveDate,
    pub tasks: Vec<Note>,
    pub notes: Vec<Note>,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    /// 0.0 when there are no tasks.
    pub completion_ratio: f64,
}

impl NotesSummary {
    pub fn completion_percentage(&self) -> f64 {
        self.completion_ratio * 100.0
    }
}

pub fn summarize_notes(date: NaiveDate, all: Vec<Note>) -> NotesSummary {
    let (tasks, notes): (Vec<Note>, Vec<Note>) =
        all.into_iter().partition(|n| n.kind == NoteKind::Task);
    let completed_tasks = tasks.iter().filter(|t| t.is_completed).count();
    let total_tasks = tasks.len();
    let completion_ratio = if total_tasks == 0 {
        0.0
    } else {
        completed_tasks as f64 / total_tasks as f64
    };

    NotesSummary {
        date,
        tasks,
        notes,
        completed_tasks,
        total_tasks,
        completion_ratio,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub expenses: f64,
    pub protein: f64,
    pub water: u32,
    pub notes: usize,
    pub has_data: bool,
    pub protein_goal_met: bool,
    pub water_goal_met: bool,
    pub protein_level: u8,
    pub water_level: u8,
}

impl DaySummary {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            expenses: 0.0,
            protein: 0.0,
            water: 0,
            notes: 0,
            has_data: false,
            protein_goal_met: false,
            water_goal_met: false,
            protein_level: 0,
            water_level: 0,
        }
    }

    fn finish(&mut self) {
        self.protein_goal_met = self.protein >= PROTEIN_GOAL_G;
        self.water_goal_met = self.water >= WATER_GOAL_ML;
        self.protein_level = intensity(self.protein, PROTEIN_GOAL_G);
        self.water_level = intensity(f64::from(self.water), f64::from(WATER_GOAL_ML));
    }
}

/// Calendar colour bucket: 3 at goal, 2 from 75%, 1 from 50%, else 0.
pub fn intensity(value: f64, goal: f64) -> u8 {
    let percentage = GoalProgress::new(value, goal).percentage;
    if percentage >= 100.0 {
        3
    } else if percentage >= 75.0 {
        2
    } else if percentage >= 50.0 {
        1
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotals {
    pub expenses: f64,
    pub protein_goal_days: usize,
    pub water_goal_days: usize,
    pub active_days: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub previous_month: String,
    pub next_month: String,
    /// Blank cells before day 1 in a Sunday-first calendar.
    pub leading_blanks: u32,
    pub days: Vec<DaySummary>,
    pub totals: MonthTotals,
}

impl MonthlySummary {
    pub fn day(&self, date: NaiveDate) -> Option<&DaySummary> {
        self.days.iter().find(|d| d.date == date)
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = first_of_month(date);
    let end = start
        .checked_add_months(Months::new(1))
        .map(|next| next - Duration::days(1))
        .unwrap_or(start);
    (start, end)
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn summarize_month(
    month: NaiveDate,
    expenses: &[Expense],
    protein: &[ProteinEntry],
    water: &[WaterEntry],
    notes: &[Note],
) -> MonthlySummary {
    let (start, end) = month_bounds(month);
    let mut days: BTreeMap<NaiveDate, DaySummary> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| (d, DaySummary::empty(d)))
        .collect();

    for e in expenses {
        if let Some(day) = days.get_mut(&e.date) {
            day.expenses += e.amount;
            day.has_data = true;
        }
    }
    for p in protein {
        if let Some(day) = days.get_mut(&p.date) {
            day.protein += p.protein_amount;
            day.has_data = true;
        }
    }
    for w in water {
        if let Some(day) = days.get_mut(&w.date) {
            day.water = day.water.saturating_add(w.amount_ml);
            day.has_data = true;
        }
    }
    for n in notes {
        if let Some(day) = days.get_mut(&n.date) {
            day.notes += 1;
            day.has_data = true;
        }
    }

    let mut days: Vec<DaySummary> = days.into_values().collect();
    for day in &mut days {
        day.finish();
    }

    let totals = MonthTotals {
        expenses: days.iter().map(|d| d.expenses).sum(),
        protein_goal_days: days.iter().filter(|d| d.protein_goal_met).count(),
        water_goal_days: days.iter().filter(|d| d.water_goal_met).count(),
        active_days: days.iter().filter(|d| d.has_data).count(),
    };

    let previous = start
        .checked_sub_months(Months::new(1))
        .unwrap_or(start);
    let next = start.checked_add_months(Months::new(1)).unwrap_or(start);

    MonthlySummary {
        month: month_label(start),
        start,
        end,
        previous_month: month_label(previous),
        next_month: month_label(next),
        leading_blanks: start.weekday().num_days_from_sunday(),
        days,
        totals,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub expense_total: f64,
    pub expense_count: usize,
    pub protein: GoalProgress,
    pub water: GoalProgress,
    pub completed_tasks: usize,
    pub total_tasks: usize,
}

pub fn summarize_dashboard(
    date: NaiveDate,
    expenses: &[Expense],
    protein: &[ProteinEntry],
    water: &[WaterEntry],
    notes: Vec<Note>,
) -> DashboardSummary {
    let protein_total: f64 = protein.iter().map(|p| p.protein_amount).sum();
    let notes = summarize_notes(date, notes);
    DashboardSummary {
        date,
        expense_total: expenses.iter().map(|e| e.amount).sum(),
        expense_count: expenses.len(),
        protein: GoalProgress::new(protein_total, PROTEIN_GOAL_G),
        water: GoalProgress::new(f64::from(water_total(water)), f64::from(WATER_GOAL_ML)),
        completed_tasks: notes.completed_tasks,
        total_tasks: notes.total_tasks,
    }
}
