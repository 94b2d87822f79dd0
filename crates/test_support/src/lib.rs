//! Helpers shared by integration tests: record stream rendering, line
//! diffs, and golden stream files.

mod stream;

pub use stream::{EXPECTED_STREAM_FORMAT_V1, event_lines, parse_expected_stream};

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Context around the first differing line, for assertion messages.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    use std::fmt::Write;
    const MISSING: &str = "<missing>";
    let line = |lines: &[String], i: usize| -> String {
        lines.get(i).cloned().unwrap_or_else(|| MISSING.to_string())
    };

    let total = expected.len().max(actual.len());
    let mut out = String::new();
    match (0..total).find(|&i| line(expected, i) != line(actual, i)) {
        Some(first) => {
            let from = first.saturating_sub(2);
            let to = (first + 3).min(total);
            let _ = writeln!(&mut out, "first difference at line {}:", first + 1);
            for i in from..to {
                let marker = if i == first { ">" } else { " " };
                let _ = writeln!(&mut out, "{marker} {:>4} expected: {}", i + 1, line(expected, i));
                let _ = writeln!(&mut out, "{marker} {:>4}   actual: {}", i + 1, line(actual, i));
            }
        }
        None => {
            let _ = writeln!(&mut out, "no differences");
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// Panic with a readable diff when two line sequences differ.
#[track_caller]
pub fn assert_lines_eq(expected: &[String], actual: &[String], what: &str) {
    if expected != actual {
        panic!("{what} mismatch\n{}", diff_lines(expected, actual));
    }
}
