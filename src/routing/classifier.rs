//! Read/write classification by leading SQL keyword.
//!
//! Leading whitespace, `--` line comments, `/* */` block comments and
//! opening parentheses are skipped before the keyword is read.

/// Keywords that make a statement a write.
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "TRUNCATE", "REPLACE", "GRANT", "REVOKE",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    pub fn is_write(&self) -> bool {
        matches!(self, StatementKind::Write)
    }
}

/// Classify a statement by its first keyword.
pub fn classify(sql: &str) -> StatementKind {
    let keyword = first_keyword(sql);
    if WRITE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
        StatementKind::Write
    } else {
        StatementKind::Read
    }
}

fn first_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}
