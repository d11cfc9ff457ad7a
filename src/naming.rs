//! Destination table naming: filename slugs and bounded table names.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Longest table name [`table_name`] produces.
pub const MAX_TABLE_NAME_LEN: usize = 64;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("Hardcode regex pattern"));

/// Collapses every run of non-word characters to one `_`, trims `_` from both
/// ends and lowercases. The result is ASCII only; empty input gives `""`.
pub fn slug(text: &str) -> String {
    NON_WORD
        .replace_all(text, "_")
        .trim_matches('_')
        .to_ascii_lowercase()
}

/// File name without directories and without its last extension.
pub fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
}

/// Builds `data_<upload_id>_<slug>`, at most [`MAX_TABLE_NAME_LEN`] characters.
///
/// Only the slug is shortened, so the upload id always survives and two
/// uploads never share a name. An empty slug yields `data_<upload_id>`.
pub fn table_name(upload_id: i64, slug: &str) -> String {
    let prefix = format!("data_{upload_id}");
    let room = MAX_TABLE_NAME_LEN.saturating_sub(prefix.len() + 1);
    let slug = slug[..floor_char_boundary(slug, room)].trim_end_matches('_');
    if slug.is_empty() {
        prefix
    } else {
        format!("{prefix}_{slug}")
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_filename_stems() {
        assert_eq!(slug(file_stem("Sales Report (Q1).xlsx")), "sales_report_q1");
        assert_eq!(slug("__Already_Clean__"), "already_clean");
        assert_eq!(slug("Ünïcödé budget 2024"), "n_c_d_budget_2024");
        assert_eq!(slug("!!!"), "");
        assert_eq!(slug(""), "");
    }

    #[test]
    fn slug_is_idempotent() {
        for text in ["Sales Report (Q1)", "a--b__c", " x ", "ÄÖÜ", "report.final.v2", "___"] {
            let once = slug(text);
            assert_eq!(slug(&once), once);
        }
    }

    #[test]
    fn file_stems() {
        assert_eq!(file_stem("uploads/2024/budget.final.xlsx"), "budget.final");
        assert_eq!(file_stem("inventory.ods"), "inventory");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn builds_table_names() {
        assert_eq!(table_name(42, "sales_report"), "data_42_sales_report");
        assert_eq!(table_name(7, ""), "data_7");
    }

    #[test]
    fn table_name_keeps_upload_id() {
        let long = "quarterly_revenue_breakdown_by_region_and_product_line_for_board_review";
        for id in [1, 42, 123_456, i64::MAX] {
            let name = table_name(id, long);
            assert!(name.len() <= MAX_TABLE_NAME_LEN, "{name}");
            assert!(name.starts_with(&format!("data_{id}")), "{name}");
        }
        assert_ne!(table_name(100, long), table_name(101, long));
    }

    #[test]
    fn table_name_trims_cut_underscore() {
        let slug = format!("{}_tail", "a".repeat(56));
        assert_eq!(table_name(1, &slug), format!("data_1_{}", "a".repeat(56)));
    }
}
