//! Output line buffers for the code emitter.
//!
//! A bundle collects the declaration and code lines of one procedure; the
//! emitter renders them in that order. Lines carry their own leading
//! indentation produced by [`indent_str`].

use crate::consts::INDENT_WIDTH;

use std::fmt;

/// Padding pool; enough for 20 nesting levels.
static SPACES: &str =
    "                                                                                ";

/// Padding for a statement at the given nesting depth. Levels beyond the
/// emitter's maximum are clamped.
pub fn indent_str(level: usize) -> &'static str {
    let n = (level * INDENT_WIDTH).min(SPACES.len());
    &SPACES[..n]
}

/// Declaration and code line buffers of one procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    /// Declaration lines.
    pub decl: Vec<String>,
    /// Code lines.
    pub code: Vec<String>,
}

impl Bundle {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a declaration line.
    pub fn append_decl(&mut self, line: impl Into<String>) {
        self.decl.push(line.into());
    }

    /// Append a code line.
    pub fn append_code(&mut self, line: impl Into<String>) {
        self.code.push(line.into());
    }

    /// Index the next code line will land at.
    pub fn next_code_idx(&self) -> usize {
        self.code.len()
    }

    /// Splice a label onto the code line at `idx`, replacing its leading
    /// indentation step.
    pub fn add_label(&mut self, idx: usize, label: u32) {
        if let Some(line) = self.code.get_mut(idx) {
            let rest = line.get(INDENT_WIDTH..).unwrap_or("");
            *line = format!("l{label}: {rest}");
        }
    }

    /// Render declarations, a separating blank line, then code.
    pub fn write(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for line in &self.decl {
            writeln!(out, "{line}")?;
        }
        if self.decl.last().map_or(false, |l| !l.starts_with(' ')) {
            writeln!(out)?;
        }
        for line in &self.code {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indentation_is_four_spaces_per_level() {
        assert_eq!(indent_str(0), "");
        assert_eq!(indent_str(1), "    ");
        assert_eq!(indent_str(3).len(), 12);
        assert_eq!(indent_str(1000).len(), SPACES.len());
    }

    #[test]
    fn labels_replace_the_leading_indent() {
        let mut b = Bundle::new();
        b.append_code(format!("{}x = 1;", indent_str(1)));
        let idx = b.next_code_idx();
        b.append_code(format!("{}return x;", indent_str(1)));
        b.add_label(idx, 2);
        assert_eq!(b.code[idx], "l2: return x;");
    }

    #[test]
    fn write_separates_decl_and_code() {
        let mut b = Bundle::new();
        b.append_decl("int foo()");
        b.append_code("{ }");
        let mut out = String::new();
        b.write(&mut out).unwrap();
        assert_eq!(out, "int foo()\n\n{ }\n");
    }
}
