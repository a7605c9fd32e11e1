use std::fmt::Write as _;

use super::{REPORT_TITLE, Report};

pub fn render(report: &Report<'_>) -> String {
    let mut out = format!(
        "# {REPORT_TITLE}\n**Generated:** {}\n\n**Live:** {} of {} streams\n\n",
        report.generated_label(),
        report.summary.live,
        report.summary.total
    );
    out.push_str("| # | Channel | Stream URL | Group | Status | Time |\n");
    out.push_str("|---|---------|------------|-------|--------|------|\n");

    for (i, r) in report.results.iter().enumerate() {
        let marker = if r.is_live() { "✅" } else { "❌" };
        let _ = writeln!(
            out,
            "| {} | {} | [{url}]({url}) | {} | {marker} {} | {} ms |",
            i + 1,
            escape_cell(&r.entry.name),
            escape_cell(r.entry.group_or_default()),
            escape_cell(&r.status_line()),
            r.elapsed_ms,
            url = escape_cell(&r.entry.url),
        );
    }

    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_results;

    #[test]
    fn renders_table_rows() {
        let results = sample_results();
        let md = render(&Report::new(&results, 3));

        assert!(md.starts_with("# HLS Stream Check Report\n**Generated:** "));
        assert!(md.contains("**Live:** 1 of 3 streams"));
        assert!(md.contains(
            "| 1 | News <24> | [http://a.example/news.m3u8](http://a.example/news.m3u8) | News | ✅ Live (Segments: 4) | 120 ms |"
        ));
        assert!(md.contains("| 2 | Gone |"));
        assert!(md.contains("❌ Down (Status: 404)"));
    }

    #[test]
    fn escapes_pipes_in_cells() {
        let results = sample_results();
        let md = render(&Report::new(&results, 3));

        assert!(md.contains("| 3 | Slow \\| Channel |"));
    }
}
