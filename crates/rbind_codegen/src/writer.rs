/// Line-oriented text builder with block indentation.
pub struct CodeWriter {
    buf: String,
    indent: usize,
    unit: &'static str,
}

impl CodeWriter {
    /// `unit` is one level of indentation.
    pub fn new(unit: &'static str) -> Self {
        Self {
            buf: String::new(),
            indent: 0,
            unit,
        }
    }

    /// Writes `text` at the current indentation; embedded newlines are indented too.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for line in text.as_ref().lines() {
            if !line.is_empty() {
                for _ in 0..self.indent {
                    self.buf.push_str(self.unit);
                }
                self.buf.push_str(line);
            }
            self.buf.push('\n');
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Writes `text` and indents what follows.
    pub fn open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(text);
        self.indent += 1;
        self
    }

    /// Dedents and writes `text`.
    pub fn close(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line(text)
    }

    /// Appends pre-rendered text verbatim.
    pub fn raw(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(text);
        self
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_indent_their_body() {
        let mut w = CodeWriter::new("    ");
        w.open("fn f() {").line("let x = 1;\nx").close("}");
        assert_eq!(w.finish(), "fn f() {\n    let x = 1;\n    x\n}\n");
    }

    #[test]
    fn empty_lines_carry_no_trailing_whitespace() {
        let mut w = CodeWriter::new("  ");
        w.open("{").line("a\n\nb").close("}");
        assert_eq!(w.finish(), "{\n  a\n\n  b\n}\n");
    }
}
