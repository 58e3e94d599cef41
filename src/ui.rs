use crate::session::{CurrentUser, Notice, NoticeKind};
use chrono::{Duration, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Dashboard,
    Expenses,
    Protein,
    Water,
    Notes,
    Analysis,
    Admin,
    None,
}

const NAV_ITEMS: &[(Nav, &str, &str)] = &[
    (Nav::Dashboard, "/", "Dashboard"),
    (Nav::Expenses, "/expenses", "Expenses"),
    (Nav::Protein, "/protein", "Protein Diet"),
    (Nav::Water, "/water", "Water Tracker"),
    (Nav::Notes, "/notes", "Notes"),
    (Nav::Analysis, "/analysis", "Analysis"),
];

pub struct Page<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub user: Option<&'a CurrentUser>,
    pub notice: Option<Notice>,
    pub body: String,
}

pub fn render_page(page: Page<'_>) -> String {
    LAYOUT_HTML
        .replace("{{TITLE}}", &escape(page.title))
        .replace("{{NAV}}", &render_nav(page.nav, page.user))
        .replace("{{NOTICE}}", &render_notice(page.notice.as_ref()))
        .replace("{{BODY}}", &page.body)
}

fn render_nav(active: Nav, user: Option<&CurrentUser>) -> String {
    let Some(user) = user else {
        return String::new();
    };

    let mut links: Vec<String> = NAV_ITEMS
        .iter()
        .map(|(nav, href, label)| nav_link(*nav == active, href, label))
        .collect();
    if user.is_admin {
        links.push(nav_link(active == Nav::Admin, "/admin", "Admin"));
    }

    format!(
        r#"<nav class="nav">{links}<span class="who">{name}</span><form method="post" action="/auth/sign-out"><button class="tab" type="submit">Sign out</button></form></nav>"#,
        links = links.join(""),
        name = escape(user.display_name()),
    )
}

fn nav_link(active: bool, href: &str, label: &str) -> String {
    let class = if active { "tab active" } else { "tab" };
    format!(r#"<a class="{class}" href="{href}">{label}</a>"#)
}

fn render_notice(notice: Option<&Notice>) -> String {
    let Some(notice) = notice else {
        return String::new();
    };
    let kind = match notice.kind {
        NoticeKind::Success => "ok",
        NoticeKind::Error => "error",
    };
    let description = notice
        .description
        .as_deref()
        .map(|d| format!("<span>{}</span>", escape(d)))
        .unwrap_or_default();
    format!(
        r#"<div class="status" data-type="{kind}" role="status"><strong>{}</strong>{description}</div>"#,
        escape(&notice.title)
    )
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Whole amounts print without decimals, everything else with two.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

pub fn format_liters(ml: f64) -> String {
    format!("{:.1}L", ml / 1000.0)
}

pub fn progress_bar(percentage: f64, class: &str) -> String {
    format!(
        r#"<div class="bar {class}"><span style="width: {:.0}%"></span></div>"#,
        percentage.clamp(0.0, 100.0)
    )
}

pub fn stat(label: &str, value: &str, class: &str) -> String {
    format!(
        r#"<div class="stat"><span class="label">{}</span><span class="value {class}">{value}</span></div>"#,
        escape(label)
    )
}

pub fn delete_button(action: &str, label: &str) -> String {
    format!(
        r#"<form method="post" action="{action}" class="inline"><button class="btn-ghost" type="submit" aria-label="{label}">✕</button></form>"#
    )
}

pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if date == today + Duration::days(1) {
        "Tomorrow".to_string()
    } else if date == today - Duration::days(1) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %b %-d").to_string()
    }
}

pub fn render_not_found(user: Option<&CurrentUser>) -> String {
    render_page(Page {
        title: "Page not found",
        nav: Nav::None,
        user,
        notice: None,
        body: r#"<section class="card"><h2>404</h2><p class="subtitle">Oops! Page not found.</p><a class="tab active" href="/">Return to Home</a></section>"#.to_string(),
    })
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}} · Daily Tracker</title>
  <style>
    @import url('https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&family=Fraunces:wght@600&display=swap');

    :root {
      --bg-1: #f8f3e6;
      --bg-2: #f5d3a7;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --protein: #d9822b;
      --water: #2f8fd8;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      display: grid;
      justify-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(960px, 100%);
      background: var(--card);
      backdrop-filter: blur(12px);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 24px;
    }

    h1, h2 {
      font-family: "Fraunces", "Georgia", serif;
      font-weight: 600;
      margin: 0;
    }

    .subtitle {
      margin: 0;
      color: #5f5c57;
    }

    .nav {
      display: flex;
      flex-wrap: wrap;
      gap: 6px;
      padding: 6px;
      background: rgba(47, 72, 88, 0.08);
      border-radius: 999px;
      align-items: center;
    }

    .nav form {
      margin-left: auto;
    }

    .who {
      color: #6b645d;
      font-size: 0.85rem;
      padding: 0 8px;
    }

    .tab {
      background: transparent;
      border: none;
      border-radius: 999px;
      padding: 8px 14px;
      font-size: 0.9rem;
      font-weight: 600;
      color: #6b645d;
      text-decoration: none;
      cursor: pointer;
    }

    .tab.active {
      background: white;
      color: var(--accent-2);
      box-shadow: 0 8px 16px rgba(47, 72, 88, 0.12);
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .card, .stat {
      background: white;
      border-radius: 18px;
      padding: 18px;
      border: 1px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 10px;
    }

    .stat .label {
      font-size: 0.85rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .stat .value {
      font-size: 1.7rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .value.expense { color: var(--accent); }
    .value.protein { color: var(--protein); }
    .value.water { color: var(--water); }

    .bar {
      height: 10px;
      border-radius: 999px;
      background: rgba(47, 72, 88, 0.1);
      overflow: hidden;
    }

    .bar span {
      display: block;
      height: 100%;
      background: var(--accent-2);
    }

    .bar.protein span { background: var(--protein); }
    .bar.water span { background: var(--water); }

    form.grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
      gap: 12px;
      align-items: end;
    }

    form.inline {
      display: inline;
    }

    label {
      display: grid;
      gap: 6px;
      font-size: 0.85rem;
      color: #6b645d;
    }

    input, select {
      border: 1px solid rgba(47, 72, 88, 0.2);
      border-radius: 12px;
      padding: 10px 12px;
      font: inherit;
      background: white;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 12px 18px;
      font-size: 0.95rem;
      font-weight: 600;
      cursor: pointer;
    }

    .btn-add {
      background: var(--accent);
      color: white;
      box-shadow: 0 10px 24px rgba(255, 107, 74, 0.3);
    }

    .btn-sub {
      background: var(--accent-2);
      color: white;
    }

    .btn-ghost {
      background: transparent;
      color: #a05a4f;
      padding: 6px 10px;
    }

    ul.rows {
      list-style: none;
      margin: 0;
      padding: 0;
      display: grid;
      gap: 8px;
    }

    ul.rows li {
      display: flex;
      align-items: center;
      justify-content: space-between;
      gap: 12px;
      padding: 10px 12px;
      border-radius: 12px;
      background: rgba(47, 72, 88, 0.04);
    }

    .done {
      text-decoration: line-through;
      color: #8b857d;
    }

    .calendar {
      display: grid;
      grid-template-columns: repeat(7, 1fr);
      gap: 6px;
    }

    .calendar .head {
      text-align: center;
      font-size: 0.8rem;
      color: #8b857d;
    }

    .calendar a.day {
      display: grid;
      gap: 4px;
      min-height: 64px;
      padding: 6px;
      border-radius: 12px;
      border: 1px solid rgba(47, 72, 88, 0.1);
      background: white;
      color: inherit;
      text-decoration: none;
    }

    .calendar a.day.empty { opacity: 0.5; }
    .calendar a.day.today { border-color: var(--accent); }
    .calendar a.day.selected { box-shadow: 0 0 0 2px rgba(255, 107, 74, 0.4); }

    .dots { display: flex; gap: 3px; }
    .dot { width: 8px; height: 8px; border-radius: 50%; background: rgba(47, 72, 88, 0.15); }
    .dot.expense { background: var(--accent); }
    .dot.l1 { opacity: 0.45; }
    .dot.l2 { opacity: 0.75; }
    .dot.protein { background: var(--protein); }
    .dot.water { background: var(--water); }

    .status {
      font-size: 0.95rem;
      padding: 12px 16px;
      border-radius: 14px;
      display: grid;
      gap: 4px;
    }

    .status[data-type="error"] {
      color: #c63b2b;
      background: rgba(198, 59, 43, 0.08);
    }

    .status[data-type="ok"] {
      color: #2d7a4b;
      background: rgba(45, 122, 75, 0.08);
    }

    .hint {
      margin: 0;
      color: #6f6a65;
      font-size: 0.9rem;
    }

    @media (max-width: 600px) {
      .app {
        padding: 28px 22px;
      }
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Daily Tracker</h1>
      <p class="subtitle">{{TITLE}}</p>
    </header>
    {{NAV}}
    {{NOTICE}}
    {{BODY}}
  </main>
</body>
</html>
"#;
