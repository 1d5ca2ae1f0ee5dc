//! Protobuf schema canonicalization.
//!
//! `.proto` sources are normalized textually: comments are stripped and
//! whitespace is collapsed, outside of string literals. That folds the common
//! byte-level differences between copies of the same definition (formatting,
//! comment churn) without taking on a full protobuf parser.

use tabula_core::ArtifactType;

use super::{CanonError, Canonicalizer};

/// Characters that never need surrounding whitespace in proto syntax.
const PUNCTUATION: [char; 11] = ['{', '}', '(', ')', '[', ']', '<', '>', ';', ',', '='];

/// Canonicalizer for Protobuf schema content.
pub struct ProtobufCanonicalizer;

impl Canonicalizer for ProtobufCanonicalizer {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::protobuf()
    }

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>, CanonError> {
        let source = std::str::from_utf8(content)
            .map_err(|_| CanonError::malformed("content is not valid UTF-8"))?;
        normalize(source).map(String::into_bytes)
    }
}

fn normalize(source: &str) -> Result<String, CanonError> {
    let mut out = String::with_capacity(source.len());
    let mut pending_space = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut terminated = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return Err(CanonError::malformed("unterminated block comment"));
                }
                pending_space = true;
            }
            quote @ ('"' | '\'') => {
                emit(&mut out, &mut pending_space, quote);
                copy_string_literal(quote, &mut chars, &mut out)?;
            }
            c if c.is_whitespace() => pending_space = true,
            c => emit(&mut out, &mut pending_space, c),
        }
    }

    Ok(out)
}

/// Copies a string literal body verbatim, through the closing quote.
fn copy_string_literal(
    quote: char,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    out: &mut String,
) -> Result<(), CanonError> {
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '\\' {
            let escaped = chars
                .next()
                .ok_or_else(|| CanonError::malformed("unterminated string literal"))?;
            out.push(escaped);
        } else if c == quote {
            return Ok(());
        }
    }
    Err(CanonError::malformed("unterminated string literal"))
}

/// Appends `c` to the output, inserting a separating space only between two
/// non-punctuation tokens.
fn emit(out: &mut String, pending_space: &mut bool, c: char) {
    if *pending_space
        && !PUNCTUATION.contains(&c)
        && out
            .chars()
            .next_back()
            .is_some_and(|last| !PUNCTUATION.contains(&last))
    {
        out.push(' ');
    }
    *pending_space = false;
    out.push(c);
}
