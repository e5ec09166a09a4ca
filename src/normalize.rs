//! Line normalization for extracted text.
//!
//! Pure and deterministic: no I/O, no allocation beyond the output. The
//! output lines are the atomic unit the rest of the pipeline embeds and
//! stores, so the invariant here is strict: no line is ever empty or
//! whitespace-only.

/// Normalize a block of extracted text into clean lines.
///
/// Per line: characters outside the printable 7-bit range are removed,
/// surrounding whitespace is trimmed, and lines left empty are dropped.
/// Idempotent: feeding the output back through changes nothing.
pub fn normalize(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.chars()
                .filter(|c| c.is_ascii() && !c.is_ascii_control())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_non_ascii_and_trims() {
        let lines = normalize("  héllo wörld  \nplain line\n");
        assert_eq!(lines, vec!["hllo wrld", "plain line"]);
    }

    #[test]
    fn strips_control_characters() {
        let lines = normalize("bell\u{7}and\ttab");
        assert_eq!(lines, vec!["bellandtab"]);
    }

    #[test]
    fn drops_empty_and_whitespace_lines() {
        let lines = normalize("first\n\n   \n\u{2603}\nsecond");
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn never_returns_empty_lines() {
        let input = "a\n\n \n\u{fffd}\u{fffd}\n b \n";
        for line in normalize(input) {
            assert!(!line.trim().is_empty());
        }
    }

    #[test]
    fn idempotent() {
        let input = "  Grants for véterans \n\n  housing aid\t\n\u{1f3e0}\n";
        let once = normalize(input);
        let twice = normalize(&once.join("\n"));
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_empty_output() {
        assert!(normalize("").is_empty());
        assert!(normalize("\n\n\n").is_empty());
    }
}
