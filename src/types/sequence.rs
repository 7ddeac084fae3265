use std::fmt;

use nom::{
    branch::alt,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    multi::separated_list1,
    sequence::{pair, preceded},
    IResult,
};

use crate::error::{Error, Result};

/// One end of a range. `*` stands for the largest number in use in the mailbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
    Num(u32),
    Last,
}

impl Bound {
    fn resolve(self, last: u32) -> u32 {
        match self {
            Bound::Num(n) => n,
            Bound::Last => last,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Bound::Num(n) => write!(f, "{}", n),
            Bound::Last => f.write_str("*"),
        }
    }
}

/// A validated message set such as `1,2:4` (messages 1, 2, 3 and 4) or `10:*`.
///
/// Numbers are either sequence numbers or uids depending on how the set is used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSet {
    ranges: Vec<(Bound, Bound)>,
}

fn bound(input: &str) -> IResult<&str, Bound> {
    alt((
        map(char('*'), |_| Bound::Last),
        map(
            map_res(digit1, |d: &str| d.parse::<u32>()),
            Bound::Num,
        ),
    ))(input)
}

fn range(input: &str) -> IResult<&str, (Bound, Bound)> {
    map(pair(bound, opt(preceded(char(':'), bound))), |(a, b)| {
        (a, b.unwrap_or(a))
    })(input)
}

impl SequenceSet {
    /// Parse and validate a message set. Zero is not a valid message number.
    pub fn parse(input: &str) -> Result<Self> {
        let (_, ranges) = all_consuming(separated_list1(char(','), range))(input.trim())
            .map_err(|_| Error::InvalidArgument(input.to_string()))?;
        if ranges
            .iter()
            .any(|&(a, b)| a == Bound::Num(0) || b == Bound::Num(0))
        {
            return Err(Error::InvalidArgument(input.to_string()));
        }
        Ok(SequenceSet { ranges })
    }

    /// A set holding a single number.
    pub fn single(n: u32) -> Self {
        SequenceSet {
            ranges: vec![(Bound::Num(n), Bound::Num(n))],
        }
    }

    /// Whether `n` is in the set, given that `*` means `last`.
    pub fn contains(&self, n: u32, last: u32) -> bool {
        self.ranges.iter().any(|&(a, b)| {
            let (a, b) = (a.resolve(last), b.resolve(last));
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            lo <= n && n <= hi
        })
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(a, b)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if a == b {
                write!(f, "{}", a)?;
            } else {
                write!(f, "{}:{}", a, b)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for SequenceSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SequenceSet::parse(s)
    }
}
