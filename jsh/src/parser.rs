//! Command line splitting.
//!
//! Whitespace separated words, with a trailing `&` word selecting
//! background execution. No quoting, escaping or globbing.

use jsh_types::{JshError, JshResult};

/// Longest accepted command line in bytes.
pub const MAX_LINE: usize = 8192;
/// Most words accepted in one command line.
pub const MAX_ARGS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    pub argv: Vec<String>,
    pub background: bool,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }
}

pub fn parse_line(line: &str) -> JshResult<ParsedLine> {
    if line.len() > MAX_LINE {
        return Err(JshError::Usage(format!(
            "command line too long (max {MAX_LINE} bytes)"
        )));
    }

    let mut argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        return Ok(ParsedLine::default());
    }

    let background = argv.last().is_some_and(|word| word == "&");
    if background {
        argv.pop();
    }

    if argv.len() > MAX_ARGS {
        return Err(JshError::Usage(format!("too many arguments (max {MAX_ARGS})")));
    }

    Ok(ParsedLine { argv, background })
}
