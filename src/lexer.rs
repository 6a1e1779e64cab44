use crate::error::LexError;
use crate::token::{Span, Spanned, Token};

/// Incremental reader over sequence text.
///
/// The text is never modified as it is read; an explicit byte offset marks how
/// far it has been consumed. More text can be appended at any time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexer {
    source: String,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            source: input.to_string(),
            pos: 0,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed text, including any leading whitespace.
    pub fn remaining(&self) -> &str {
        &self.source[self.pos..]
    }

    /// Nothing left but whitespace.
    pub fn is_exhausted(&self) -> bool {
        self.remaining().trim_start().is_empty()
    }

    pub fn append(&mut self, text: &str) {
        self.source.push_str(text);
    }

    /// Read one command. Returns [`Token::End`] when the text is exhausted.
    ///
    /// Unrecognised text is an error and is left unconsumed, so repeated calls
    /// keep failing at the same place.
    pub fn next_command(&mut self) -> Result<Spanned, LexError> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(ch) = self.peek() else {
            return Ok(self.spanned(Token::End, start));
        };

        let token = match ch.to_ascii_lowercase() {
            'c' => Token::Note(0),
            'd' => Token::Note(2),
            'e' => Token::Note(4),
            'f' => Token::Note(5),
            'g' => Token::Note(7),
            'a' => Token::Note(9),
            'b' => Token::Note(11),
            'r' => Token::Rest,
            'o' => Token::Octave,
            '>' => Token::OctaveUp,
            '<' => Token::OctaveDown,
            't' => Token::Tempo,
            'v' => Token::Volume,
            _ => return Err(LexError::UnexpectedChar { ch, pos: start }),
        };
        self.pos += ch.len_utf8();

        // `#` sharpens the natural notes; `e#` and `b#` are not spelled.
        let token = match token {
            Token::Note(pc) if self.peek() == Some('#') && !matches!(pc, 4 | 11) => {
                self.pos += 1;
                Token::Note(pc + 1)
            }
            other => other,
        };

        Ok(self.spanned(token, start))
    }

    /// Read an unsigned decimal argument if one follows.
    ///
    /// Leading whitespace is skipped. Returns `None` (consuming nothing but the
    /// whitespace) when no digit follows. Values too large for `u32` saturate.
    pub fn read_number(&mut self) -> Option<Spanned> {
        let save = self.pos;
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            self.pos = save;
            return None;
        }

        let value = self.source[start..self.pos].parse::<u32>().unwrap_or(u32::MAX);
        Some(self.spanned(Token::Number(value), start))
    }

    /// Read everything left, commands and their arguments, up to the end or
    /// the first unrecognised text.
    pub fn tokenize(&mut self) -> (Vec<Spanned>, Option<LexError>) {
        let mut tokens = Vec::new();
        loop {
            match self.next_command() {
                Ok(spanned) if spanned.token == Token::End => return (tokens, None),
                Ok(spanned) => {
                    let takes_number = spanned.token.takes_number();
                    tokens.push(spanned);
                    if takes_number {
                        if let Some(number) = self.read_number() {
                            tokens.push(number);
                        }
                    }
                }
                Err(e) => return (tokens, Some(e)),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn spanned(&self, token: Token, start: usize) -> Spanned {
        Spanned {
            token,
            span: Span {
                start,
                end: self.pos,
            },
        }
    }
}
