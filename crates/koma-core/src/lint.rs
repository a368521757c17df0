//! Lint diagnostics for comic pages.
//!
//! Reports structural issues without modifying the page. Restore logs the
//! findings; the CLI and the browser bridge show them to the user.

use crate::bubble::Bubble;
use crate::id::{BubbleId, PanelId, RowId};
use crate::layout::find_layout;
use crate::model::{Page, Row, RowKind};
use serde::Serialize;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    /// Should be fixed; the page renders differently than intended.
    Warning,
    /// Informational.
    Info,
}

/// What a diagnostic points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum LintTarget {
    Row(RowId),
    Panel(PanelId),
    Bubble(BubbleId),
}

/// A single lint diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintDiagnostic {
    pub target: LintTarget,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "width-sum", "bubble-bounds").
    pub rule: &'static str,
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Run all lint rules over the page and return diagnostics.
#[must_use]
pub fn lint_page(page: &Page) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    for (idx, row) in page.rows.iter().enumerate() {
        lint_width_sum(idx, row, &mut diags);
        lint_layout(idx, row, &mut diags);
    }
    lint_bubble_bounds(page, &mut diags);
    diags
}

// ─── Rules ───────────────────────────────────────────────────────────────

/// Widths of a multi-panel row should add up to 100.
fn lint_width_sum(idx: usize, row: &Row, diags: &mut Vec<LintDiagnostic>) {
    if row.panels.len() < 2 {
        return;
    }
    let total: f32 = row.panels.iter().map(|p| p.width).sum();
    if (total - 100.0).abs() <= 1.0 {
        return;
    }
    let frozen = row.panels.iter().all(|p| p.locked);
    diags.push(LintDiagnostic {
        target: LintTarget::Row(row.id),
        message: if frozen {
            format!(
                "Row {} is fully locked with widths summing to {total:.1}%; unlock a panel to fix it.",
                idx + 1
            )
        } else {
            format!("Row {} widths sum to {total:.1}% instead of 100%.", idx + 1)
        },
        severity: LintSeverity::Warning,
        rule: if frozen { "frozen-widths" } else { "width-sum" },
    });
}

/// Group rows should name a registered layout for their panel count.
fn lint_layout(idx: usize, row: &Row, diags: &mut Vec<LintDiagnostic>) {
    let RowKind::Group { layout } = &row.kind else {
        return;
    };
    if layout.is_empty() {
        diags.push(LintDiagnostic {
            target: LintTarget::Row(row.id),
            message: format!("Row {} has no layout; panels are laid out in one row.", idx + 1),
            severity: LintSeverity::Info,
            rule: "unknown-layout",
        });
        return;
    }
    match find_layout(layout) {
        None => diags.push(LintDiagnostic {
            target: LintTarget::Row(row.id),
            message: format!(
                "Row {} uses unknown layout `{layout}`; panels are laid out in one row.",
                idx + 1
            ),
            severity: LintSeverity::Warning,
            rule: "unknown-layout",
        }),
        Some(def) if def.count != row.panels.len() => diags.push(LintDiagnostic {
            target: LintTarget::Row(row.id),
            message: format!(
                "Layout `{layout}` holds {} panels but row {} has {}.",
                def.count,
                idx + 1,
                row.panels.len()
            ),
            severity: LintSeverity::Warning,
            rule: "layout-count",
        }),
        Some(_) => {}
    }
}

/// Bubbles should stay inside their panel box.
fn lint_bubble_bounds(page: &Page, diags: &mut Vec<LintDiagnostic>) {
    for (n, panel) in page.panels().enumerate() {
        for bubble in panel.bubbles().filter(|b| !b.fits_panel()) {
            diags.push(LintDiagnostic {
                target: LintTarget::Bubble(bubble.id),
                message: format!(
                    "Bubble {} extends outside panel {} ({}).",
                    bubble.id,
                    n + 1,
                    extent(bubble)
                ),
                severity: LintSeverity::Info,
                rule: "bubble-bounds",
            });
        }
    }
}

fn extent(b: &Bubble) -> String {
    format!(
        "x {:.0}..{:.0}%, y {:.0}..{:.0}%",
        b.x_pct,
        b.x_pct + b.w_pct,
        b.y_pct,
        b.y_pct + b.h_pct
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────
