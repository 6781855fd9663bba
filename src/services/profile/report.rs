use std::fmt::Write;

use super::types::*;
use super::utils::group_thousands;

/// Renders the fixed markdown report for a profile.
///
/// The output depends only on the profile, so the same profile always
/// renders to the same string. It is shown to the user as-is and embedded
/// verbatim in the risk-analysis prompt.
pub fn render_report(profile: &DatasetProfile) -> String {
    let mut out = String::new();

    out.push_str("📊 **Dataset Overview**\n");
    let _ = writeln!(out, "- Rows: {}", group_thousands(profile.row_count));
    let _ = writeln!(out, "- Columns: {}", group_thousands(profile.column_count));
    let _ = writeln!(
        out,
        "- Total Missing Values: {}",
        group_thousands(profile.total_missing)
    );
    out.push_str("\n🧩 **Column Details:**\n");

    for column in &profile.columns {
        let _ = writeln!(out, "\n• **{}** ({})", column.name, column.declared_type);
        let _ = writeln!(out, "   - Missing Values: {}", group_thousands(column.missing_count));
        let _ = writeln!(out, "   - Unique Values: {}", group_thousands(column.distinct_count));
        let _ = writeln!(out, "   - Example Values: {}", render_samples(column));
    }

    out
}

fn render_samples(column: &ColumnProfile) -> String {
    let items: Vec<String> = column.sample_values.iter().map(|v| v.to_literal()).collect();
    format!("[{}]", items.join(", "))
}
