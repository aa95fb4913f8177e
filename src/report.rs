use crate::snapshot::ResponseSnapshot;
use crate::types::{RunSummary, Verdict};
use colored::Colorize;

/// Raw-body excerpt cap for unparseable payloads.
const MAX_RAW_EXCERPT: usize = 2048;

/// Renders one exchange for failure investigation: ordered headers table,
/// pretty body (or a capped raw excerpt), and the verdict's mismatches.
pub fn render_exchange(snapshot: &ResponseSnapshot, verdict: Option<&Verdict>) -> String {
    let mut out = String::new();
    out.push_str(&format!("status: {}\n", snapshot.status()));

    out.push_str("headers:\n");
    let width = snapshot
        .headers()
        .keys()
        .map(|k| k.len())
        .max()
        .unwrap_or(0);
    for (name, value) in snapshot.headers() {
        out.push_str(&format!("  {name:width$}  {value}\n"));
    }

    out.push_str("body:\n");
    match snapshot.body_json() {
        Ok(body) => {
            let pretty =
                serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
            for line in pretty.lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        Err(_) => {
            let text = snapshot.body_text();
            let text = text.trim_end();
            if text.is_empty() {
                out.push_str("  <empty>\n");
            } else {
                let (shown, truncated) = excerpt(text);
                for line in shown.lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
                if truncated > 0 {
                    out.push_str(&format!("  [truncated, {truncated} more bytes]\n"));
                }
            }
        }
    }

    if let Some(verdict) = verdict {
        if !verdict.passed {
            out.push_str("mismatches:\n");
            for m in &verdict.mismatches {
                out.push_str(&format!(
                    "  {}: expected {}, got {}\n",
                    m.check, m.expected, m.actual
                ));
            }
        }
    }
    out
}

fn excerpt(text: &str) -> (&str, usize) {
    if text.len() <= MAX_RAW_EXCERPT {
        return (text, 0);
    }
    let mut end = MAX_RAW_EXCERPT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], text.len() - end)
}

pub fn render_human(
    summary: &RunSummary,
    verbose: bool,
    hide_fails: bool,
    hide_passes: bool,
) -> String {
    let mut out = String::new();
    let mut header = format!(
        "Total: {}, Passed: {}, Failed: {}",
        summary.total,
        summary.passed.to_string().green(),
        if summary.failed > 0 {
            summary.failed.to_string().red().bold().to_string()
        } else {
            summary.failed.to_string().green().to_string()
        }
    );
    if summary.errored > 0 {
        header.push_str(&format!(
            " ({} {})",
            summary.errored.to_string().red(),
            "errored".red()
        ));
    }
    out.push_str(&header);
    out.push('\n');
    for case in &summary.cases {
        if case.passed() {
            if hide_passes {
                continue;
            }
            out.push_str(&format!("{} {}\n", "[OK]".green().bold(), case.id.green()));
        } else {
            if hide_fails {
                continue;
            }
            let tag = if case.errored() { "[ERR]" } else { "[FAIL]" };
            out.push_str(&format!(
                "{} {}\n",
                tag.red().bold(),
                case.id.red().bold()
            ));
            if let Some(err) = &case.error {
                out.push_str(&format!("  {} {}\n", "error   :".bold(), err.red()));
            } else {
                for m in &case.verdict.mismatches {
                    out.push_str(&format!(
                        "  {} expected {}, got {}\n",
                        format!("{}:", m.check).bold(),
                        m.expected,
                        m.actual
                    ));
                }
            }
            if verbose {
                if let Some(diagnostics) = &case.diagnostics {
                    for line in diagnostics.lines() {
                        out.push_str("  ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
    }
    out
}

pub fn print_human(summary: &RunSummary, verbose: bool, hide_fails: bool, hide_passes: bool) {
    print!("{}", render_human(summary, verbose, hide_fails, hide_passes));
}
