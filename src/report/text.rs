use super::Report;

/// One block per result, separated by `---`
pub fn render(report: &Report<'_>) -> String {
    report
        .results
        .iter()
        .map(|r| {
            format!(
                "Channel: {}\nURL: {}\nStatus: {}\nGroup: {}\nLogo: {}\nError: {}\n---",
                r.entry.name,
                r.entry.url,
                r.status_line(),
                r.entry.group_or_default(),
                r.entry.logo_or_default(),
                r.error_detail.as_deref().unwrap_or("None"),
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}
