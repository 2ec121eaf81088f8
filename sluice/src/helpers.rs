use std::ops::RangeInclusive;

use snafu::{ResultExt, Snafu};

#[derive(Debug, Clone, Snafu)]
pub enum RangeParserError {
    #[snafu(display("Empty range string"))]
    Empty,
    #[snafu(display("Invalid range"))]
    Invalid,
    #[snafu(display("Failed to parse range bound"))]
    Parse { source: std::num::ParseIntError },
}

/// Parses either a single value (`100`) or an inclusive range (`50-500`).
pub fn parse_range(range_str: &str) -> Result<RangeInclusive<usize>, RangeParserError> {
    let range_str = range_str.trim();
    if range_str.is_empty() {
        return Err(RangeParserError::Empty);
    }

    let Some((start, end)) = range_str.split_once('-') else {
        let value = range_str.parse::<usize>().context(ParseSnafu {})?;
        return Ok(value..=value);
    };

    let start = start.trim().parse::<usize>().context(ParseSnafu {})?;
    let end = end.trim().parse::<usize>().context(ParseSnafu {})?;

    if start > end {
        return Err(RangeParserError::Invalid);
    }

    Ok(start..=end)
}
