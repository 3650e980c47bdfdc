//! The reader: whitespace-delimited source text to value graphs.
//!
//! Token recognition at a given position, in precedence order:
//!
//! 1. Quotation: a leading `'` reads one following expression and
//!    wraps it in `(quote ...)`.
//! 2. Decimal: optional leading `-`, at least one `.`, remaining
//!    characters `[0-9.]`.
//! 3. Integer: optional leading `-`, one or more digits.
//! 4. String: `"..."`, terminated by the next `"`; the bytes between
//!    the quotes become the payload, uninterpreted.
//! 5. Symbol: one or more of `[0-9A-Za-z!$%&*+-./:<=>?@^_~'#]`,
//!    terminated by whitespace or `)`.
//! 6. Combination: `(` ... matching `)`; the empty combination reads
//!    to the absent value.
//!
//! The reader reports how many bytes it consumed so a driver can walk
//! a source string expression by expression. On a parse error the
//! caller must not evaluate.

use slip_core::{Handle, Heap};
use thiserror::Error;

/// Reader failures. These are host-level errors, not Error values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),

    #[error("unterminated combination starting at byte {0}")]
    UnterminatedList(usize),

    #[error("unexpected ')' at byte {0}")]
    UnexpectedClose(usize),

    #[error("expected an expression after ' at byte {0}")]
    DanglingQuote(usize),

    #[error("invalid token '{token}' at byte {at}")]
    BadToken { token: String, at: usize },
}

/// One successfully read expression plus the bytes consumed to get it,
/// leading whitespace included.
#[derive(Debug, Clone, Copy)]
pub struct ReadOutcome {
    pub value: Handle,
    pub consumed: usize,
}

/// Read one expression from the front of `source`.
///
/// Whitespace-only input yields the absent value with everything
/// consumed; callers that loop over a source string should test for
/// that before evaluating.
pub fn read(source: &str, heap: &mut Heap) -> Result<ReadOutcome, ReadError> {
    let mut cursor = Cursor::new(source);
    cursor.skip_whitespace();
    if cursor.at_eof() {
        return Ok(ReadOutcome {
            value: None,
            consumed: cursor.pos,
        });
    }
    let value = parse_expr(&mut cursor, heap)?;
    Ok(ReadOutcome {
        value,
        consumed: cursor.pos,
    })
}

/// Byte-oriented scanning position. The input language is ASCII-delimited,
/// so byte inspection is safe; payload slices stay on char boundaries
/// because every delimiter is ASCII.
struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    /// Scan one delimiter-terminated token and return it.
    fn take_token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || b == b')' {
                break;
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }
}

fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!$%&*+-./:<=>?@^_~'#".contains(&b)
}

/// Parse one expression; the cursor stands on its first byte.
fn parse_expr(cursor: &mut Cursor<'_>, heap: &mut Heap) -> Result<Handle, ReadError> {
    match cursor.peek() {
        Some(b'\'') => parse_quotation(cursor, heap),
        Some(b'(') => parse_combination(cursor, heap),
        Some(b'"') => parse_string(cursor, heap),
        Some(b')') => Err(ReadError::UnexpectedClose(cursor.pos)),
        Some(_) => parse_atom(cursor, heap),
        // callers guarantee a byte is present
        None => Err(ReadError::BadToken {
            token: String::new(),
            at: cursor.pos,
        }),
    }
}

fn parse_quotation(cursor: &mut Cursor<'_>, heap: &mut Heap) -> Result<Handle, ReadError> {
    let at = cursor.pos;
    cursor.bump();
    cursor.skip_whitespace();
    if cursor.at_eof() {
        return Err(ReadError::DanglingQuote(at));
    }
    let quoted = parse_expr(cursor, heap)?;
    let tail = heap.cons(quoted, None);
    let quote = heap.make_symbol("quote");
    Ok(heap.cons(quote, tail))
}

fn parse_combination(cursor: &mut Cursor<'_>, heap: &mut Heap) -> Result<Handle, ReadError> {
    let open_at = cursor.pos;
    cursor.bump();

    let mut items: Vec<Handle> = Vec::new();
    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            None => return Err(ReadError::UnterminatedList(open_at)),
            Some(b')') => {
                cursor.bump();
                break;
            }
            Some(_) => items.push(parse_expr(cursor, heap)?),
        }
    }

    // cons from the right so the list reads left-to-right
    let mut out: Handle = None;
    for item in items.into_iter().rev() {
        out = heap.cons(item, out);
    }
    Ok(out)
}

fn parse_string(cursor: &mut Cursor<'_>, heap: &mut Heap) -> Result<Handle, ReadError> {
    let open_at = cursor.pos;
    cursor.bump();
    let start = cursor.pos;
    while let Some(b) = cursor.peek() {
        if b == b'"' {
            let text = &cursor.src[start..cursor.pos];
            cursor.bump();
            return Ok(heap.make_string(text));
        }
        cursor.bump();
    }
    Err(ReadError::UnterminatedString(open_at))
}

/// Decimal, integer or symbol, decided over the whole token.
fn parse_atom(cursor: &mut Cursor<'_>, heap: &mut Heap) -> Result<Handle, ReadError> {
    let at = cursor.pos;
    let token = cursor.take_token();
    debug_assert!(!token.is_empty());

    let digits = token.strip_prefix('-').unwrap_or(token);

    let decimal_shaped =
        !digits.is_empty() && digits.contains('.') && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.');
    if decimal_shaped {
        // tokens like "1.2.3" fit the shape but are not numbers; they
        // fall through to the symbol rule
        if let Ok(value) = token.parse::<f64>() {
            return Ok(heap.make_decimal(value));
        }
    }

    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(value) = token.parse::<i64>() {
            return Ok(heap.make_int(value));
        }
    }

    if token.bytes().all(is_symbol_byte) {
        return Ok(heap.make_symbol(token));
    }

    Err(ReadError::BadToken {
        token: token.to_string(),
        at,
    })
}
