use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// Deepest list nesting either parse mode accepts.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(text) => Some(text),
            SExp::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            SExp::Atom(_) => None,
        }
    }

    fn children(&self) -> &[SExp] {
        self.as_list().unwrap_or(&[])
    }

    /// Leading atom of a list, e.g. `property` for `(property "Value" "10k")`.
    pub fn head(&self) -> Option<&str> {
        self.atom_at(0)
    }

    /// Atom at position `index` of a list (the head is index 0).
    pub fn atom_at(&self, index: usize) -> Option<&str> {
        self.children().get(index)?.as_atom()
    }

    /// First child list headed by `key`: its single value for `(key value)`,
    /// the whole child for longer forms.
    pub fn get(&self, key: &str) -> Option<&SExp> {
        self.children().iter().find_map(|child| match child.as_list()? {
            [head, value] if head.as_atom() == Some(key) => Some(value),
            [head, _, _, ..] if head.as_atom() == Some(key) => Some(child),
            _ => None,
        })
    }

    pub fn get_all(&self, key: &str) -> Vec<&SExp> {
        self.children()
            .iter()
            .filter(|child| child.head() == Some(key))
            .collect()
    }

    /// String value of a `(key "value" …)` child.
    pub fn string_value(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            SExp::Atom(value) => Some(value.clone()),
            form => form.atom_at(1).map(str::to_string),
        }
    }
}

enum Token {
    Open,
    Close,
    Atom(String),
}

/// S-expression reader.
///
/// `parse` reads one complete form. `parse_open` is the line-oriented mode:
/// KiCad writes most forms across several lines, so a single line such as
/// `(property "Value" "10k" (id 1) (at 10 20 0)` is an *open* list. In that
/// mode running out of input closes every open list instead of failing.
/// An unterminated string is an error in both modes.
pub struct SExpParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> SExpParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        self.read(false)
    }

    pub fn parse_open(&mut self) -> Result<SExp, ParseError> {
        self.read(true)
    }

    fn read(&mut self, lenient: bool) -> Result<SExp, ParseError> {
        let mut open: Vec<Vec<SExp>> = Vec::new();
        loop {
            let form = match self.next_token()? {
                Some(Token::Open) => {
                    if open.len() == MAX_NESTING {
                        return Err(ParseError::TooDeep(MAX_NESTING));
                    }
                    open.push(Vec::new());
                    continue;
                }
                Some(Token::Close) => match open.pop() {
                    Some(items) => SExp::List(items),
                    None => return Err(ParseError::UnexpectedToken(")".to_string())),
                },
                Some(Token::Atom(text)) => SExp::Atom(text),
                None if lenient && !open.is_empty() => return Ok(close_all(open)),
                None => return Err(ParseError::UnexpectedEof),
            };
            match open.last_mut() {
                Some(parent) => parent.push(form),
                None => return Ok(form),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();

        match trimmed.chars().next() {
            None => Ok(None),
            Some('(') => {
                self.pos += 1;
                Ok(Some(Token::Open))
            }
            Some(')') => {
                self.pos += 1;
                Ok(Some(Token::Close))
            }
            Some('"') => self.quoted().map(Some),
            Some(_) => {
                let len = trimmed
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(trimmed.len());
                self.pos += len;
                Ok(Some(Token::Atom(trimmed[..len].to_string())))
            }
        }
    }

    /// Reads a string literal; `pos` is at the opening quote.
    fn quoted(&mut self) -> Result<Token, ParseError> {
        let body = &self.src[self.pos + 1..];
        let mut text = String::new();
        let mut chars = body.char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 2;
                    return Ok(Token::Atom(text));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, other)) => text.push(other),
                    None => break,
                },
                _ => text.push(c),
            }
        }
        Err(ParseError::UnexpectedEof)
    }
}

fn close_all(mut open: Vec<Vec<SExp>>) -> SExp {
    let mut form = SExp::List(open.pop().unwrap_or_default());
    while let Some(mut parent) = open.pop() {
        parent.push(form);
        form = SExp::List(parent);
    }
    form
}
