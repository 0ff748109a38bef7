//! Lexical analysis of a single command string.
//!
//! The quoting rule is deliberately small: a `'` or `"` toggles one quoted-region
//! flag, whitespace inside a quoted region belongs to the current word and the
//! quote characters themselves are dropped. The same rule decides whether an
//! operator character (`;`, `&`, `|`, `<`, `>`) is live, so every splitting
//! helper in this module agrees on what "inside quotes" means.

fn is_quote(ch: char) -> bool {
    ch == '\'' || ch == '"'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    Quoted,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    fn make_tokens(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.input.next() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::Quoted => self.handle_quoted(ch),
            }
        }

        // An open quote simply absorbs the rest of the line.
        if self.state != LexingState::Start {
            out.push(std::mem::take(&mut self.buffer));
        }
        out
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => {}
            c if is_quote(c) => self.state = LexingState::Quoted,
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            c if c.is_whitespace() => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            c if is_quote(c) => self.state = LexingState::Quoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_quoted(&mut self, ch: char) {
        if is_quote(ch) {
            self.state = LexingState::ReadingWord;
        } else {
            self.buffer.push(ch);
        }
    }
}

/// Split one command string into its argument vector.
///
/// Empty or all-blank input yields an empty vector.
pub fn tokenize(line: &str) -> Vec<String> {
    LexingFSM::new(line).make_tokens()
}

/// Byte offsets of every `sep` that sits outside a quoted region.
fn unquoted_positions(line: &str, sep: char) -> impl Iterator<Item = usize> + '_ {
    let mut quoted = false;
    line.char_indices().filter_map(move |(i, ch)| {
        if is_quote(ch) {
            quoted = !quoted;
            None
        } else if ch == sep && !quoted {
            Some(i)
        } else {
            None
        }
    })
}

/// Split on every unquoted occurrence of `sep`. Quote characters are kept.
pub fn split_unquoted(line: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in unquoted_positions(line, sep) {
        parts.push(&line[start..pos]);
        start = pos + sep.len_utf8();
    }
    parts.push(&line[start..]);
    parts
}

pub fn contains_unquoted(line: &str, sep: char) -> bool {
    unquoted_positions(line, sep).next().is_some()
}
