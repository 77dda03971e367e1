/// Source left after removing an executable-script header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shebang<'a> {
    pub body: &'a str,
    /// Physical line of the file that `body` starts on.
    pub start_line: usize,
}

/// Drops the first line, terminator included, when the text starts with `#`.
pub fn strip_shebang(text: &str) -> Shebang<'_> {
    if !text.starts_with('#') {
        return Shebang {
            body: text,
            start_line: 1,
        };
    }
    let body = match text.find(&['\n', '\r'][..]) {
        Some(i) if text[i..].starts_with("\r\n") => &text[i + 2..],
        Some(i) => &text[i + 1..],
        None => "",
    };
    Shebang {
        body,
        start_line: 2,
    }
}
