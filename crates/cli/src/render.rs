use keycheck_types::{OffendingKey, ValidationReport, ValidationStatus};

/// Plain-text summary of a run, offenders grouped by status.
pub fn render_report(report: &ValidationReport) -> String {
    let mut lines = vec![format!(
        "Checked {} keys ({} validated, {} from cache)",
        report.total_keys, report.validated_count, report.cached_count
    )];
    for status in [
        ValidationStatus::Valid,
        ValidationStatus::InvalidFormat,
        ValidationStatus::Duplicate,
        ValidationStatus::SignatureMismatch,
    ] {
        lines.push(format!("  {:<20}{}", format!("{status}:"), report.count(status)));
    }

    for status in [
        ValidationStatus::InvalidFormat,
        ValidationStatus::Duplicate,
        ValidationStatus::SignatureMismatch,
    ] {
        let offenders: Vec<String> = report.offenders_with(status).map(describe).collect();
        if offenders.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{}:", heading(status)));
        lines.extend(offenders.into_iter().map(|line| format!("  {line}")));
    }

    lines.push(String::new());
    if report.is_clean() {
        lines.push("No invalid keys found".to_string());
    } else {
        lines.push(format!(
            "{} occurrences of invalid data found",
            report.offending_keys.len()
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn heading(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Valid => "Valid keys",
        ValidationStatus::InvalidFormat => "Malformed keys",
        ValidationStatus::Duplicate => "Duplicate keys",
        ValidationStatus::SignatureMismatch => "Invalid signatures",
    }
}

fn describe(key: &OffendingKey) -> String {
    let line = format!(
        "{} 0x{} (used: {})",
        key.locator,
        hex::encode(&key.public_key),
        key.used
    );
    if key.duplicate_of.is_empty() {
        return line;
    }
    let peers: Vec<String> = key.duplicate_of.iter().map(ToString::to_string).collect();
    format!("{line}, also at {}", peers.join(", "))
}
