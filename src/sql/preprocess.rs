//! Query text normalization applied before parsing and planning.
//!
//! PostgreSQL folds unquoted identifiers to lower case when it renders
//! plan text, so the query must be folded the same way or no filter will
//! ever match textually.

/// Lowercase every character outside single-quoted literals and
/// double-quoted identifiers. Doubled quotes inside a quoted section
/// (`'it''s'`, `"a""b"`) are kept as part of that section.
pub fn lowercase_unquoted(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    if chars.peek() == Some(&q) {
                        // Escaped quote, stay inside.
                        if let Some(next) = chars.next() {
                            out.push(next);
                        }
                    } else {
                        quote = None;
                    }
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    out.push(c);
                } else {
                    out.extend(c.to_lowercase());
                }
            }
        }
    }

    out
}

/// Split a script on `;` outside quoted sections. Blank statements are
/// dropped and each statement is trimmed.
pub fn split_statements(script: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in script.char_indices() {
        match (quote, c) {
            // A doubled quote closes and reopens, which nets out.
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ';') => {
                statements.push(&script[start..i]);
                start = i + 1;
            }
            (None, _) => {}
        }
    }
    statements.push(&script[start..]);

    statements.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}
