//! Plain-text rendering of a dashboard frame. The theme only picks the ANSI
//! palette for headings and secondary text.

use crate::{
    aggregates::Summary,
    dashboard::{DashboardView, LoadStatus},
    model::Origin,
    preferences::Theme,
};
use std::fmt::Write;

const RESET: &str = "\x1b[0m";

struct Palette {
    heading: &'static str,
    muted: &'static str,
    alert: &'static str,
}

impl Palette {
    const fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                heading: "\x1b[1;97m",
                muted: "\x1b[90m",
                alert: "\x1b[1;91m",
            },
            Theme::Light => Self {
                heading: "\x1b[1;34m",
                muted: "\x1b[2m",
                alert: "\x1b[1;31m",
            },
        }
    }

    fn heading(&self, text: &str) -> String {
        format!("{}{text}{RESET}", self.heading)
    }

    fn muted(&self, text: &str) -> String {
        format!("{}{text}{RESET}", self.muted)
    }
}

#[must_use]
pub fn render(view: &DashboardView, theme: Theme) -> String {
    let palette = Palette::for_theme(theme);
    let mut out = String::new();

    let who = view
        .identity
        .as_ref()
        .and_then(|identity| identity.email.as_deref())
        .unwrap_or("unknown user");
    let state = if view.live { "live" } else { "static" };
    let _ = writeln!(
        out,
        "{} {}",
        palette.heading("Onboardly dashboard"),
        palette.muted(&format!("({who}, {state})"))
    );

    match (&view.status, &view.summary) {
        (LoadStatus::Loading, _) => {
            let _ = writeln!(out, "Loading...");
        }
        (LoadStatus::Failed(message), _) => {
            let _ = writeln!(out, "{}{message}{RESET}", palette.alert);
            let _ = writeln!(out, "{}", palette.muted("Run the command again to retry."));
        }
        (LoadStatus::Ready, Some(summary)) => render_summary(&mut out, &palette, summary),
        (LoadStatus::Ready, None) => {}
    }
    out
}

fn render_summary(out: &mut String, palette: &Palette, summary: &Summary) {
    let counts = summary.counts;
    let _ = writeln!(
        out,
        "Employees: {}  Apps: {}  Active onboardings: {}  Average adoption: {}%",
        counts.employees, counts.apps, counts.active_onboardings, summary.average_adoption
    );

    let _ = writeln!(out, "\n{}", palette.heading("App usage"));
    if summary.app_usage.is_empty() {
        let _ = writeln!(out, "  {}", palette.muted("no apps"));
    }
    for usage in &summary.app_usage {
        let _ = writeln!(out, "  {:<24} {:>4}", usage.name, usage.onboardings);
    }

    let _ = writeln!(
        out,
        "\n{}",
        palette.heading("Last 7 days        employees  onboardings")
    );
    for day in &summary.daily {
        let _ = writeln!(
            out,
            "  {}  {:>9}  {:>11}",
            day.date, day.employees, day.onboardings
        );
    }

    let _ = writeln!(out, "\n{}", palette.heading("Recent activity"));
    if summary.recent_activity.is_empty() {
        let _ = writeln!(out, "  {}", palette.muted("nothing yet"));
    }
    for entry in &summary.recent_activity {
        let when = entry.created_at.map_or_else(
            || "                ".to_string(),
            |at| at.format("%Y-%m-%d %H:%M").to_string(),
        );
        let marker = match entry.origin {
            Origin::Local => palette.muted(" (local)"),
            Origin::Backend => String::new(),
        };
        let _ = writeln!(out, "  {}  {}{marker}", palette.muted(&when), entry.text());
    }
}
