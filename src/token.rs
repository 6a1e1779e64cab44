use serde::{Deserialize, Serialize};

/// Pitch-class names indexed by semitone above C.
pub const PITCH_CLASS_NAMES: [&str; 12] =
    ["c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Token {
    /// `a`–`g`, optionally sharpened with `#`. Carries the semitone above C.
    Note(u8),
    /// `r`
    Rest,
    /// `o`: set octave (takes a number).
    Octave,
    /// `>`
    OctaveUp,
    /// `<`
    OctaveDown,
    /// `t`: set tempo in BPM (takes a number).
    Tempo,
    /// `v`: set volume 0 to 10 (takes a number).
    Volume,
    /// Unsigned decimal argument.
    Number(u32),
    End,
}

impl Token {
    /// Commands that may be followed by a numeric argument.
    pub fn takes_number(&self) -> bool {
        matches!(
            self,
            Token::Note(_) | Token::Rest | Token::Octave | Token::Tempo | Token::Volume
        )
    }
}

/// Byte range into the sequence text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

/// Convert a token back to its source representation.
pub fn token_to_string(token: &Token) -> String {
    match token {
        Token::Note(pc) => PITCH_CLASS_NAMES[(*pc % 12) as usize].into(),
        Token::Rest => "r".into(),
        Token::Octave => "o".into(),
        Token::OctaveUp => ">".into(),
        Token::OctaveDown => "<".into(),
        Token::Tempo => "t".into(),
        Token::Volume => "v".into(),
        Token::Number(n) => n.to_string(),
        Token::End => "".into(),
    }
}

/// Re-assemble a token stream into canonical (lowercase, unspaced) text.
pub fn tokens_to_string(tokens: &[Spanned]) -> String {
    tokens.iter().map(|s| token_to_string(&s.token)).collect()
}
