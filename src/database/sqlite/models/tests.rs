use super::*;
use chrono::NaiveDate;

fn record_with_summary(summary: &str) -> DocumentRecord {
    DocumentRecord {
        id: "doc".to_string(),
        filename: "lease.pdf".to_string(),
        path: "/contracts/lease.pdf".to_string(),
        page_count: 3,
        chunk_count: 9,
        summary: summary.to_string(),
        ingested_at: NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid timestamp"),
    }
}

#[test]
fn summary_preview_uses_first_non_empty_line() {
    let record = record_with_summary("\n\n  - Parties: Landlord and Tenant\n- Term: 5 years");
    assert_eq!(record.summary_preview(80), "- Parties: Landlord and Tenant");
}

#[test]
fn summary_preview_truncates_on_char_boundary() {
    let record = record_with_summary("Vertraulichkeit über fünf Jahre");
    assert_eq!(record.summary_preview(15), "Vertraulichkeit…");
}

#[test]
fn summary_preview_of_empty_summary() {
    let record = record_with_summary("");
    assert_eq!(record.summary_preview(40), "");
}
