use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Tables
// ============================================================================

/// Print rows under a bold header, columns padded to their widest cell
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    let lines = format_table(headers, rows);
    let mut lines = lines.iter();
    if let Some(head) = lines.next() {
        println!("  {}", head.bold());
    }
    if let Some(rule) = lines.next() {
        println!("  {}", rule.dimmed());
    }
    for line in lines {
        println!("  {line}");
    }
}

/// Header line, rule line, then one line per row
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render_row(headers.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str), &widths));
    }
    lines
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Join a list for a table cell, `-` when empty
pub fn list_cell(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// Truncate a string for display, keeping the start
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = text.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_pads_columns() {
        let rows = vec![
            vec!["web-1".to_string(), "10.0.0.5".to_string()],
            vec!["database".to_string(), "db".to_string()],
        ];
        let lines = format_table(&["Name", "Address"], &rows);
        assert_eq!(lines[0], "Name      Address");
        assert_eq!(lines[1], "────────  ────────");
        assert_eq!(lines[2], "web-1     10.0.0.5");
        assert_eq!(lines[3], "database  db");
    }

    #[test]
    fn test_format_table_no_rows() {
        let lines = format_table(&["Name"], &[]);
        assert_eq!(lines, vec!["Name", "────"]);
    }

    #[test]
    fn test_list_cell() {
        assert_eq!(list_cell(&[]), "-");
        assert_eq!(list_cell(&["a".into(), "b".into()]), "a, b");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-command", 10), "a-very-...");
        assert_eq!(truncate("abcdef", 2), "...");
    }
}
