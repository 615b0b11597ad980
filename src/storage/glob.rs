//! Glob Patterns for Key Selection
//!
//! Used by `keys` and pattern deletes. Supported syntax:
//!
//! - `*` matches any run of characters, including none
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the class
//! - `[^abc]` matches one character not in the class
//! - `\x` matches `x` literally
//!
//! Matching is byte-wise. A class that is never closed matches nothing.

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(u8),
    AnyOne,
    AnyRun,
    Class { negate: bool, ranges: Vec<(u8, u8)> },
    /// An unterminated `[`; nothing can match past it.
    Broken,
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            tokens: compile(pattern.as_bytes()),
        }
    }

    /// True if `text` carries any glob metacharacter that `delete` treats as
    /// a pattern rather than a literal key.
    pub fn is_pattern(text: &str) -> bool {
        text.bytes().any(|b| b == b'*' || b == b'?')
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.as_bytes();
        let tokens = &self.tokens;

        let (mut t, mut s) = (0usize, 0usize);
        // Resume point for the last `*`: (token after star, text position)
        let mut star: Option<(usize, usize)> = None;

        while s < text.len() {
            let step = match tokens.get(t) {
                Some(Token::AnyRun) => {
                    star = Some((t + 1, s));
                    t += 1;
                    continue;
                }
                Some(token) => token.matches_one(text[s]),
                None => false,
            };

            if step {
                t += 1;
                s += 1;
            } else if let Some((after, from)) = star {
                // Let the star swallow one more character and retry
                t = after;
                s = from + 1;
                star = Some((after, from + 1));
            } else {
                return false;
            }
        }

        tokens[t..].iter().all(|token| *token == Token::AnyRun)
    }
}

impl Token {
    fn matches_one(&self, byte: u8) -> bool {
        match self {
            Token::Literal(c) => *c == byte,
            Token::AnyOne => true,
            Token::Class { negate, ranges } => {
                let hit = ranges.iter().any(|&(lo, hi)| lo <= byte && byte <= hi);
                hit != *negate
            }
            Token::AnyRun | Token::Broken => false,
        }
    }
}

fn compile(pattern: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut i = 0;

    while i < pattern.len() {
        match pattern[i] {
            b'*' => {
                // Consecutive stars collapse
                if tokens.last() != Some(&Token::AnyRun) {
                    tokens.push(Token::AnyRun);
                }
                i += 1;
            }
            b'?' => {
                tokens.push(Token::AnyOne);
                i += 1;
            }
            b'\\' if i + 1 < pattern.len() => {
                tokens.push(Token::Literal(pattern[i + 1]));
                i += 2;
            }
            b'[' => match compile_class(&pattern[i + 1..]) {
                Some((token, used)) => {
                    tokens.push(token);
                    i += 1 + used;
                }
                None => {
                    tokens.push(Token::Broken);
                    break;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }

    tokens
}

/// Parses the body of a `[...]` class. Returns the token and the number of
/// bytes consumed including the closing `]`.
fn compile_class(body: &[u8]) -> Option<(Token, usize)> {
    let mut i = 0;
    let negate = body.first() == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut ranges = Vec::new();
    while i < body.len() {
        let mut c = body[i];
        if c == b']' {
            return Some((Token::Class { negate, ranges }, i + 1));
        }
        if c == b'\\' && i + 1 < body.len() {
            i += 1;
            c = body[i];
        }

        if i + 2 < body.len() && body[i + 1] == b'-' && body[i + 2] != b']' {
            let (lo, hi) = (c, body[i + 2]);
            ranges.push(if lo <= hi { (lo, hi) } else { (hi, lo) });
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }

    None
}
