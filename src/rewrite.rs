//! Rewrites the preamble of generated source code for the MicroPython
//! runtime.
//!
//! The external generator targets a desktop interpreter and emits a header of
//! imports that either do not exist on a board or pull in the host runtime
//! library. This module prepends a board-specific preamble and drops every
//! line that references the host ecosystem.
//!
//! The rewrite is a pure function over the line stream. It makes no attempt
//! to find the boundary between the generated header and the user program:
//! the preamble is always prepended and the forbidden substrings are filtered
//! everywhere. A user line that happens to contain a forbidden substring is
//! dropped too; that lenience is what catches the variant import syntaxes
//! the generator produces and is accepted as a documented risk.
//!
//! Running the rewrite twice prepends a second preamble. The tool is meant
//! for exactly-once post-processing, straight from the generator.

// =============================================================================
// Public Interface
// =============================================================================

/// The fixed preamble to prepend and the substrings that mark a line for
/// removal. Loaded once per run, immutable afterwards.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PreambleSpec {
    /// Lines prepended verbatim before the filtered stream.
    pub lines: Vec<String>,
    /// A line containing any of these substrings is dropped. Matching is
    /// case-sensitive.
    pub forbidden: Vec<String>,
}
impl PreambleSpec {
    /// The preamble for MicroPython targets: the board modules, the uploaded
    /// runtime support library, and a banner.
    pub fn micropython() -> Self {
        PreambleSpec {
            lines: vec![
                "# Generated for a MicroPython target (ESP32/Pico)".into(),
                "import time".into(),
                "import machine".into(),
                "from lib.boardio import *".into(),
                "".into(),
                "# User program".into(),
            ],
            forbidden: vec![
                "import sys".into(),
                "import os".into(),
                "import hostlib".into(),
                "from hostlib".into(),
            ],
        }
    }
}
impl Default for PreambleSpec {
    fn default() -> Self {
        PreambleSpec::micropython()
    }
}

/// Produce a new line stream: the preamble of `spec`, followed by every input
/// line that contains none of the forbidden substrings, in their original
/// order. The input is never mutated.
pub fn rewrite(input: &[String], spec: &PreambleSpec) -> Vec<String> {
    let mut out = spec.lines.clone();
    out.extend(
        input
            .iter()
            .filter(|line| !spec.forbidden.iter().any(|bad| line.contains(bad.as_str())))
            .cloned(),
    );
    out
}

/// Same as [`rewrite`], joined with newlines for writing to the output file.
pub fn rewrite_to_string(input: &[String], spec: &PreambleSpec) -> String {
    rewrite(input, spec).join("\n")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn prepends_preamble_and_filters_forbidden() {
        let spec = PreambleSpec {
            lines: lines(&["# banner", "import time"]),
            forbidden: lines(&["import sys", "import os"]),
        };
        let input = lines(&["import sys", "import os", "print('hi')"]);
        let out = rewrite(&input, &spec);
        assert_eq!(out, lines(&["# banner", "import time", "print('hi')"]));
    }

    #[test]
    fn output_starts_with_preamble() {
        let spec = PreambleSpec::micropython();
        let input = lines(&["x = 1", "y = 2"]);
        let out = rewrite(&input, &spec);
        assert_eq!(&out[..spec.lines.len()], &spec.lines[..]);
    }

    #[test]
    fn clean_input_is_kept_in_order() {
        let spec = PreambleSpec::micropython();
        let input = lines(&["a = 1", "b = 2", "c = a + b"]);
        let out = rewrite(&input, &spec);
        assert_eq!(&out[spec.lines.len()..], &input[..]);
    }

    #[test]
    fn forbidden_lines_are_dropped_anywhere_in_the_body() {
        let spec = PreambleSpec::micropython();
        let input = lines(&["x = 1", "from hostlib import timers", "x = 2"]);
        let out = rewrite(&input, &spec);
        assert_eq!(&out[spec.lines.len()..], &lines(&["x = 1", "x = 2"])[..]);
    }

    #[test]
    fn matching_is_substring_based() {
        let spec = PreambleSpec::micropython();
        // Intentional lenience: any line containing the substring goes,
        // whatever else is on it.
        let input = lines(&["    import sys  # indented", "keep_me()"]);
        let out = rewrite(&input, &spec);
        assert_eq!(&out[spec.lines.len()..], &lines(&["keep_me()"])[..]);
    }

    #[test]
    fn empty_input_yields_just_the_preamble() {
        let spec = PreambleSpec::micropython();
        let out = rewrite(&[], &spec);
        assert_eq!(out, spec.lines);
    }

    #[test]
    fn rewrite_is_not_idempotent() {
        let spec = PreambleSpec::micropython();
        let once = rewrite(&lines(&["x = 1"]), &spec);
        let twice = rewrite(&once, &spec);
        // The second pass strips nothing new but prepends a second preamble.
        assert_eq!(twice.len(), once.len() + spec.lines.len());
    }

    #[test]
    fn to_string_joins_with_newlines() {
        let spec = PreambleSpec {
            lines: lines(&["# banner"]),
            forbidden: vec![],
        };
        let out = rewrite_to_string(&lines(&["a = 1"]), &spec);
        assert_eq!(out, "# banner\na = 1");
    }
}
