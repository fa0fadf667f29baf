//! Byte patterns with wildcard masks.

use thiserror::Error;

/// A strict pattern check that did not hold.
///
/// Recoverable: the decoder annotates the script and falls back to the
/// generic emission for that transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternMismatch {
    #[error("Exp: {expected} bytes, act: {actual} bytes")]
    Length { expected: usize, actual: usize },

    #[error("Exp: 0x{expected:02X}, act: 0x{actual:02X} at offset {offset}")]
    Byte {
        offset: usize,
        expected: u8,
        actual: u8,
    },
}

/// Pattern over a write payload or a reassembled reply.
///
/// Mask bytes select which bits must equal; `0xFF` is an exact byte and
/// `0x00` a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Payload equals these bytes.
    Exact(&'static [u8]),
    /// Payload has the same length and agrees under the mask.
    Masked {
        bytes: &'static [u8],
        mask: &'static [u8],
    },
    /// First byte equals `byte`; length is free unless given.
    Lead { byte: u8, len: Option<usize> },
    /// First and last byte fixed, length one of `lens`.
    Bracketed {
        first: u8,
        last: u8,
        lens: &'static [usize],
    },
    /// Payload is `counts` repetitions of a masked group.
    Groups {
        bytes: &'static [u8],
        mask: &'static [u8],
        counts: &'static [usize],
    },
}

impl Pattern {
    pub fn matches(&self, data: &[u8]) -> bool {
        self.check(data).is_ok()
    }

    /// Like [`matches`](Self::matches) but reports the first disagreement.
    pub fn check(&self, data: &[u8]) -> Result<(), PatternMismatch> {
        match *self {
            Pattern::Exact(bytes) => check_masked(bytes, None, data),
            Pattern::Masked { bytes, mask } => check_masked(bytes, Some(mask), data),
            Pattern::Lead { byte, len } => {
                if let Some(len) = len {
                    check_len(len, data.len())?;
                }
                match data.first() {
                    None => Err(PatternMismatch::Length {
                        expected: 1,
                        actual: 0,
                    }),
                    Some(&b) => check_byte(0, byte, b),
                }
            }
            Pattern::Bracketed { first, last, lens } => {
                if !lens.contains(&data.len()) {
                    return Err(PatternMismatch::Length {
                        expected: lens.first().copied().unwrap_or(0),
                        actual: data.len(),
                    });
                }
                match (data.first(), data.last()) {
                    (Some(&f), Some(&l)) => {
                        check_byte(0, first, f)?;
                        check_byte(data.len() - 1, last, l)
                    }
                    _ => Err(PatternMismatch::Length {
                        expected: 1,
                        actual: 0,
                    }),
                }
            }
            Pattern::Groups {
                bytes,
                mask,
                counts,
            } => {
                let group = bytes.len();
                if group == 0
                    || data.len() % group != 0
                    || !counts.contains(&(data.len() / group))
                {
                    return Err(PatternMismatch::Length {
                        expected: group * counts.first().copied().unwrap_or(1),
                        actual: data.len(),
                    });
                }
                for (i, chunk) in data.chunks(group).enumerate() {
                    check_masked(bytes, Some(mask), chunk).map_err(|e| match e {
                        PatternMismatch::Byte {
                            offset,
                            expected,
                            actual,
                        } => PatternMismatch::Byte {
                            offset: i * group + offset,
                            expected,
                            actual,
                        },
                        other => other,
                    })?;
                }
                Ok(())
            }
        }
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), PatternMismatch> {
    if expected != actual {
        return Err(PatternMismatch::Length { expected, actual });
    }
    Ok(())
}

fn check_byte(offset: usize, expected: u8, actual: u8) -> Result<(), PatternMismatch> {
    if expected != actual {
        return Err(PatternMismatch::Byte {
            offset,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_masked(
    expected: &[u8],
    mask: Option<&[u8]>,
    actual: &[u8],
) -> Result<(), PatternMismatch> {
    check_len(expected.len(), actual.len())?;
    for (offset, (&e, &a)) in expected.iter().zip(actual).enumerate() {
        let m = mask.and_then(|m| m.get(offset).copied()).unwrap_or(0xFF);
        if (e ^ a) & m != 0 {
            return Err(PatternMismatch::Byte {
                offset,
                expected: e,
                actual: a,
            });
        }
    }
    Ok(())
}
