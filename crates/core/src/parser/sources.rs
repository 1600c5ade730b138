//! `chronyc sources -n` output.
//!
//! Source rows start with a two-character indicator: the mode (`^` server,
//! `=` peer, `#` reference clock) followed by the state, where `*` marks the
//! source currently selected for synchronisation. The identifier is the next
//! whitespace-separated column. Header, separator and summary lines never
//! match that shape and are skipped.

/// Counted sources plus the identifier of the selected one, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesReport {
    pub total: i32,
    pub selected: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct SourceRow<'a> {
    selected: bool,
    name: &'a str,
}

fn parse_row(line: &str) -> Option<SourceRow<'_>> {
    let mut chars = line.chars();
    let mode = chars.next()?;
    let state = chars.next()?;
    if !matches!(mode, '^' | '=' | '#') || !matches!(state, '*' | '+' | '-' | '?' | 'x' | '~') {
        return None;
    }
    let name = line[2..].split_whitespace().next()?;
    Some(SourceRow {
        selected: state == '*',
        name,
    })
}

/// Count listed sources and find the selected one.
///
/// Zero sources is a valid report, not an error.
pub fn parse_sources(text: &str) -> SourcesReport {
    let mut report = SourcesReport::default();
    for row in text.lines().filter_map(|l| parse_row(l.trim())) {
        report.total += 1;
        if row.selected && report.selected.is_none() {
            report.selected = Some(row.name.to_string());
        }
    }
    report
}
