// ============================================================
// Layer 4 — Line Preprocessor
// ============================================================
// Cleans one corpus line before the emptiness check and
// tokenisation.
//
// Sentence-aligned corpora exported from alignment tools carry:
//   - Non-breaking spaces (U+00A0) and zero-width spaces (U+200B)
//   - A byte order mark on the first line
//   - Windows carriage returns
//   - Stray control characters and runs of spaces
//
// A line that is only such noise must count as empty, otherwise
// the pair would survive the loader with a zero-length side.
//
// Cleaning steps (applied in order):
//   1. Map Unicode whitespace variants and control chars to a space
//   2. Collapse runs of spaces into one
//   3. Trim both ends

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a single line. The result never contains a newline.
    pub fn clean_line(&self, line: &str) -> String {
        let mut out        = String::with_capacity(line.len());
        let mut last_space = true; // swallows leading spaces

        for c in line.chars() {
            let c = match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            };
            if c.is_whitespace() {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        // At most one trailing space can remain
        if out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
