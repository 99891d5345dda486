//! Text clean-up applied to a SAD file before it is split into statements.
//!
//! The transform only touches spaces, case, comments and the `deg` unit
//! suffix, so newlines survive and statement line numbers stay valid.

const ANGLE_UNIT_SUFFIX: &str = "deg";

/// Lower-cases the text, tightens spacing around `=`, collapses runs of spaces
/// and drops every `deg` substring, repeating until nothing changes.
///
/// `deg` is removed wherever it appears, including inside names.
pub fn normalize_lattice_text(source: &str) -> String {
    let mut text = strip_comments(source)
        .replace(['\t', '\r'], " ")
        .to_lowercase();

    loop {
        let next = normalize_pass(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn normalize_pass(text: &str) -> String {
    let mut text = text.to_string();
    while text.contains(" =") {
        text = text.replace(" =", "=");
    }
    while text.contains("= ") {
        text = text.replace("= ", "=");
    }
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    text.replace(ANGLE_UNIT_SUFFIX, "")
}

/// Removes `!` comments up to the end of the line. A `!` inside a quoted
/// string is kept.
pub fn strip_comments(source: &str) -> String {
    let mut stripped = String::with_capacity(source.len());
    let mut quote: Option<char> = None;
    let mut in_comment = false;

    for ch in source.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                stripped.push(ch);
            }
            continue;
        }

        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), '\n') => quote = None,
            (None, '"' | '\'') => quote = Some(ch),
            (None, '!') => {
                in_comment = true;
                continue;
            }
            _ => {}
        }
        stripped.push(ch);
    }

    stripped
}
