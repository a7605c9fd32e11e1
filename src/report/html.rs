use std::fmt::Write as _;

use indoc::formatdoc;

use super::{REPORT_TITLE, Report};

pub fn render(report: &Report<'_>) -> String {
    let mut rows = String::new();
    for (i, r) in report.results.iter().enumerate() {
        let (class, marker) = if r.is_live() {
            ("live", "✅")
        } else {
            ("dead", "❌")
        };
        let url = escape(&r.entry.url);
        let _ = writeln!(
            rows,
            "<tr class=\"{class}\"><td>{}</td><td>{}</td><td><a href=\"{url}\">{url}</a></td><td>{}</td><td>{marker} {}</td><td>{} ms</td></tr>",
            i + 1,
            escape(&r.entry.name),
            escape(r.entry.group_or_default()),
            escape(&r.status_line()),
            r.elapsed_ms,
        );
    }

    formatdoc! {r#"
        <!DOCTYPE html>
        <html><head><meta charset="UTF-8"><title>{title}</title>
        <style>body{{font-family:sans-serif;background:#0d1117;color:#c9d1d9;}}
        table{{border-collapse:collapse;width:100%;}}
        th,td{{border:1px solid #30363d;padding:8px;text-align:left;}}
        tr:nth-child(even){{background:#161b22;}}
        a{{color:#58a6ff;}}</style></head><body>
        <h1>{title}</h1>
        <p><b>Generated:</b> {generated}</p>
        <p><b>Live:</b> {live} of {total} streams</p>
        <table><tr><th>#</th><th>Channel</th><th>Stream URL</th><th>Group</th><th>Status</th><th>Time</th></tr>
        {rows}</table></body></html>
        "#,
        title = REPORT_TITLE,
        rows = rows,
        generated = report.generated_label(),
        live = report.summary.live,
        total = report.summary.total,
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
