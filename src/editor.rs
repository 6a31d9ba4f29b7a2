//! Plain multi-line text buffer backing the code pane.
//!
//! The cursor column is a character index, not a byte offset.

/// Convert a character index to a byte index for UTF-8 safe string operations
pub(crate) fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

const TAB: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBuffer {
    lines: Vec<String>,
    row: usize,
    col: usize,
    /// First visible line, kept in range by [`EditorBuffer::scroll_into_view`].
    pub scroll: usize,
}

impl Default for EditorBuffer {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            scroll: 0,
        }
    }
}

impl EditorBuffer {
    pub fn from_text(text: &str) -> Self {
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// (row, column) of the cursor.
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn current_len(&self) -> usize {
        self.lines[self.row].chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        if c == '\n' {
            self.newline();
            return;
        }
        if c == '\t' {
            self.insert_str(TAB);
            return;
        }
        let line = &mut self.lines[self.row];
        let byte_pos = char_to_byte_index(line, self.col);
        line.insert(byte_pos, c);
        self.col += 1;
    }

    /// Insert pasted text, honouring embedded newlines.
    pub fn insert_str(&mut self, text: &str) {
        for c in text.replace("\r\n", "\n").chars() {
            match c {
                '\n' => self.newline(),
                '\r' => {}
                '\t' => {
                    for t in TAB.chars() {
                        self.insert_char(t);
                    }
                }
                c => self.insert_char(c),
            }
        }
    }

    pub fn newline(&mut self) {
        let line = &mut self.lines[self.row];
        let byte_pos = char_to_byte_index(line, self.col);
        let rest = line.split_off(byte_pos);
        self.lines.insert(self.row + 1, rest);
        self.row += 1;
        self.col = 0;
    }

    pub fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
            let line = &mut self.lines[self.row];
            let byte_pos = char_to_byte_index(line, self.col);
            line.remove(byte_pos);
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.current_len();
            self.lines[self.row].push_str(&line);
        }
    }

    pub fn delete(&mut self) {
        if self.col < self.current_len() {
            let line = &mut self.lines[self.row];
            let byte_pos = char_to_byte_index(line, self.col);
            line.remove(byte_pos);
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.current_len();
        }
    }

    pub fn move_right(&mut self) {
        if self.col < self.current_len() {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(self.current_len());
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(self.current_len());
        }
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = self.current_len();
    }

    pub fn page_down(&mut self, height: usize) {
        self.row = (self.row + height.max(1)).min(self.lines.len() - 1);
        self.col = self.col.min(self.current_len());
    }

    pub fn page_up(&mut self, height: usize) {
        self.row = self.row.saturating_sub(height.max(1));
        self.col = self.col.min(self.current_len());
    }

    /// Adjust `scroll` so the cursor row is inside a viewport of `height` lines.
    pub fn scroll_into_view(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.row < self.scroll {
            self.scroll = self.row;
        } else if self.row >= self.scroll + height {
            self.scroll = self.row + 1 - height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_text() {
        let text = "fn main() {\n    println!(\"hi\");\n}\n";
        let buffer = EditorBuffer::from_text(text);
        assert_eq!(buffer.line_count(), 4);
        assert_eq!(buffer.text(), text);
        assert!(!buffer.is_empty());
        assert!(EditorBuffer::default().is_empty());
        assert_eq!(EditorBuffer::from_text("a\r\nb").text(), "a\nb");
    }

    #[test]
    fn typing_splitting_and_joining_lines() {
        let mut buffer = EditorBuffer::default();
        for c in "leté".chars() {
            buffer.insert_char(c);
        }
        buffer.move_left();
        buffer.newline();
        assert_eq!(buffer.text(), "let\né");
        assert_eq!(buffer.cursor(), (1, 0));

        buffer.backspace();
        assert_eq!(buffer.text(), "leté");
        assert_eq!(buffer.cursor(), (0, 3));

        buffer.move_home();
        buffer.delete();
        assert_eq!(buffer.text(), "eté");
    }

    #[test]
    fn paste_keeps_newlines_and_expands_tabs() {
        let mut buffer = EditorBuffer::default();
        buffer.insert_str("if x:\r\n\treturn 1");
        assert_eq!(buffer.text(), "if x:\n    return 1");
        assert_eq!(buffer.cursor(), (1, 12));
    }

    #[test]
    fn delete_at_line_end_joins_next_line() {
        let mut buffer = EditorBuffer::from_text("ab\ncd");
        buffer.move_end();
        buffer.delete();
        assert_eq!(buffer.text(), "abcd");
    }

    #[test]
    fn vertical_moves_clamp_column() {
        let mut buffer = EditorBuffer::from_text("long line\nx");
        buffer.move_end();
        buffer.move_down();
        assert_eq!(buffer.cursor(), (1, 1));
        buffer.move_up();
        assert_eq!(buffer.cursor(), (0, 1));
        buffer.move_left();
        buffer.move_left();
        assert_eq!(buffer.cursor(), (0, 0));
    }

    #[test]
    fn scroll_follows_cursor() {
        let mut buffer = EditorBuffer::from_text(&"x\n".repeat(30));
        buffer.page_down(20);
        buffer.scroll_into_view(10);
        assert_eq!(buffer.scroll, 11);
        buffer.page_up(15);
        buffer.scroll_into_view(10);
        assert_eq!(buffer.scroll, 5);
    }
}
