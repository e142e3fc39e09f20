//! Line-indexed text surgery.
//!
//! Lines are 1-indexed and keep their terminators verbatim, so cutting a
//! range out and splicing it back in at the same line reproduces the
//! original text byte for byte. A trailing newline does not start an extra
//! line: `"a\n"` has one line and `""` has none.

use thiserror::Error;

/// Invalid line bounds handed to the surgeon.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurgeryError {
    #[error("start line {start} is after end line {end}")]
    InvertedRange { start: u32, end: u32 },

    #[error("line {line} is outside 1..={line_count}")]
    OutOfBounds { line: u32, line_count: u32 },
}

/// The two halves of an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Lines outside the range, in their original order.
    pub remainder: String,
    /// The removed lines, verbatim.
    pub chunk: String,
}

/// Iterates over lines including their terminators.
pub fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
}

pub fn line_count(text: &str) -> u32 {
    lines(text).count() as u32
}

fn check_line(line: u32, line_count: u32) -> Result<(), SurgeryError> {
    if line == 0 || line > line_count {
        return Err(SurgeryError::OutOfBounds { line, line_count });
    }
    Ok(())
}

/// Checks that `start..=end` names existing lines of `text`.
pub fn check_range(text: &str, start: u32, end: u32) -> Result<(), SurgeryError> {
    if start > end {
        return Err(SurgeryError::InvertedRange { start, end });
    }
    let count = line_count(text);
    check_line(start, count)?;
    check_line(end, count)
}

/// Removes lines `start..=end` from `text`.
pub fn extract_chunk(text: &str, start: u32, end: u32) -> Result<Extracted, SurgeryError> {
    check_range(text, start, end)?;

    let mut remainder = String::with_capacity(text.len());
    let mut chunk = String::new();
    for (index, line) in lines(text).enumerate() {
        let number = index as u32 + 1;
        if start <= number && number <= end {
            chunk.push_str(line);
        } else {
            remainder.push_str(line);
        }
    }

    Ok(Extracted { remainder, chunk })
}

/// Splices `chunk` in immediately before line `at_line` of `text`.
///
/// An `at_line` past the last line appends. A newline is added where
/// needed so the chunk never fuses with a neighbouring line.
pub fn insert_chunk(text: &str, chunk: &str, at_line: u32) -> Result<String, SurgeryError> {
    if at_line == 0 {
        return Err(SurgeryError::OutOfBounds {
            line: at_line,
            line_count: line_count(text),
        });
    }

    let mut out = String::with_capacity(text.len() + chunk.len() + 1);
    let mut inserted = false;
    for (index, line) in lines(text).enumerate() {
        if !inserted && index as u32 + 1 == at_line {
            out.push_str(chunk);
            if !chunk.is_empty() && !chunk.ends_with('\n') {
                out.push('\n');
            }
            inserted = true;
        }
        out.push_str(line);
    }

    if !inserted {
        if !chunk.is_empty() && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(chunk);
    }

    Ok(out)
}
