use crate::models::{Database, ExpenseCategory, ProteinFood};
use uuid::Uuid;

/// (group, [(emoji, name)])
const CATEGORY_GROUPS: &[(&str, &[(&str, &str)])] = &[
    (
        "Food & Beverages",
        &[
            ("🥛", "Milk"),
            ("🍵", "Tea"),
            ("☕", "Coffee"),
            ("🍳", "Breakfast"),
            ("🍛", "Lunch"),
            ("🍽️", "Dinner"),
            ("🍿", "Snacks"),
            ("🌮", "Street Food"),
            ("🫓", "Dosa / Idli / Parotta"),
            ("🥚", "Egg"),
            ("🍗", "Chicken / Fish"),
            ("💪", "Protein Foods"),
            ("🍎", "Fruits"),
            ("🥕", "Vegetables"),
            ("🍰", "Sweets / Desserts"),
            ("🧃", "Juice / Soft Drinks"),
        ],
    ),
    (
        "Household & Utilities",
        &[
            ("🛒", "Grocery"),
            ("🔥", "Cooking Gas"),
            ("⚡", "Electricity Bill"),
            ("💧", "Water Bill"),
            ("🏠", "House Rent"),
            ("🔧", "Maintenance"),
            ("🧹", "Cleaning Supplies"),
        ],
    ),
    (
        "Travel & Transport",
        &[
            ("🚌", "Bus Fare"),
            ("🚆", "Train Fare"),
            ("🛺", "Auto / Taxi"),
            ("🏍️", "Bike Fuel"),
            ("⛽", "Car Fuel"),
            ("🅿️", "Parking"),
            ("🛣️", "Toll"),
            ("🔩", "Vehicle Service"),
        ],
    ),
    (
        "Communication & Digital",
        &[
            ("📱", "Mobile Recharge"),
            ("📶", "Internet / WiFi"),
            ("📺", "OTT Subscriptions"),
            ("📲", "App Subscriptions"),
            ("☁️", "Cloud Storage"),
        ],
    ),
    (
        "Health & Fitness",
        &[
            ("💊", "Medicine"),
            ("👨‍⚕️", "Doctor Visit"),
            ("🩺", "Health Checkup"),
            ("🏋️", "Gym Fees"),
            ("🥤", "Protein Supplements"),
            ("🏃", "Fitness Equipment"),
            ("⚽", "Sports Activity"),
        ],
    ),
    (
        "Personal & Lifestyle",
        &[
            ("👕", "Clothing"),
            ("👟", "Footwear"),
            ("💇", "Haircut / Salon"),
            ("🧴", "Grooming Products"),
            ("💄", "Cosmetics"),
            ("👜", "Accessories"),
        ],
    ),
    (
        "Entertainment & Social",
        &[
            ("🎬", "Movies"),
            ("🎡", "Outing"),
            ("🎉", "Party"),
            ("🎪", "Events"),
            ("🎮", "Games"),
            ("🎥", "Streaming Rentals"),
        ],
    ),
    (
        "Shopping & Online",
        &[
            ("🛍️", "Online Shopping"),
            ("📷", "Electronics"),
            ("🔌", "Gadgets"),
            ("🏠", "Home Appliances"),
            ("✏️", "Stationery"),
        ],
    ),
    (
        "Education & Learning",
        &[
            ("🎓", "Course Fees"),
            ("💻", "Online Courses"),
            ("📚", "Books"),
            ("📝", "Exam Fees"),
            ("📜", "Certifications"),
        ],
    ),
    (
        "Work & Business",
        &[
            ("💼", "Office Travel"),
            ("🛠️", "Work Tools"),
            ("💿", "Software"),
            ("🌐", "Domain / Hosting"),
            ("🖨️", "Printing"),
        ],
    ),
    (
        "Financial",
        &[
            ("💳", "EMI"),
            ("🏦", "Loan Repayment"),
            ("💳", "Credit Card Payment"),
            ("🐷", "Savings"),
            ("📈", "Investment"),
        ],
    ),
    (
        "Miscellaneous",
        &[
            ("🎁", "Gifts"),
            ("❤️", "Charity / Donation"),
            ("🚨", "Emergency"),
            ("📦", "Other"),
        ],
    ),
];

/// (name, protein per unit in grams, unit)
const PROTEIN_FOODS: &[(&str, f64, &str)] = &[
    ("Soy Chunks", 52.0, "100g"),
    ("Chicken Breast", 31.0, "100g"),
    ("Whey Protein", 25.0, "scoop"),
    ("Peanuts", 26.0, "100g"),
    ("Peanut Butter", 25.0, "100g"),
    ("Cheese", 22.0, "100g"),
    ("Fish (Tuna/Salmon)", 22.0, "100g"),
    ("Almonds", 21.0, "100g"),
    ("Pumpkin Seeds", 19.0, "100g"),
    ("Chickpeas (Chana)", 19.0, "100g"),
    ("Paneer", 18.0, "100g"),
    ("Flax Seeds", 18.0, "100g"),
    ("Chia Seeds", 17.0, "100g"),
    ("Egg Whites", 11.0, "100g"),
    ("Greek Yogurt", 10.0, "100g"),
    ("Tofu", 9.0, "100g"),
    ("Lentils (Dal)", 9.0, "100g"),
    ("Rajma (Kidney Beans)", 8.0, "100g"),
    ("Eggs (Whole)", 6.0, "piece"),
    ("Curd (Yogurt)", 3.5, "100g"),
    ("Milk", 3.4, "100ml"),
];

pub fn default_categories() -> Vec<ExpenseCategory> {
    CATEGORY_GROUPS
        .iter()
        .flat_map(|(group, items)| {
            items.iter().map(move |(emoji, name)| ExpenseCategory {
                id: Uuid::new_v4(),
                name: (*name).to_string(),
                emoji: (*emoji).to_string(),
                group_name: (*group).to_string(),
            })
        })
        .collect()
}

pub fn default_protein_foods() -> Vec<ProteinFood> {
    PROTEIN_FOODS
        .iter()
        .zip(1u32..)
        .map(|((name, protein, unit), sort_order)| ProteinFood {
            id: Uuid::new_v4(),
            name: (*name).to_string(),
            protein_per_unit: *protein,
            unit: (*unit).to_string(),
            sort_order,
        })
        .collect()
}

/// Fills empty reference tables. Returns whether anything was added.
pub fn seed_reference_data(data: &mut Database) -> bool {
    let mut seeded = false;
    if data.expense_categories.is_empty() {
        data.expense_categories = default_categories();
        seeded = true;
    }
    if data.protein_foods.is_empty() {
        data.protein_foods = default_protein_foods();
        seeded = true;
    }
    seeded
}
