//! Range Predicates
//!
//! Sorted-set range commands describe their bounds with a small syntax:
//!
//! | Syntax   | Meaning                         |
//! |----------|---------------------------------|
//! | `-`      | unbounded below                 |
//! | `+`      | unbounded above                 |
//! | `[x`     | inclusive bound at `x`          |
//! | `(x`     | exclusive bound at `x`          |
//!
//! Score bounds additionally accept a bare number (inclusive) and
//! `-inf` / `+inf`. Lex bounds compare members byte-wise.

use crate::error::{StoreError, StoreResult};
use std::borrow::Borrow;

/// One side of a range.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary<T> {
    /// Smaller than every value
    NegInf,
    /// Larger than every value
    PosInf,
    /// Admits values equal to the bound
    Inclusive(T),
    /// Excludes values equal to the bound
    Exclusive(T),
}

impl<T> Boundary<T> {
    /// True if `value` lies on the admitted side of this boundary used as a
    /// minimum. Accepts any borrowed form of `T`, e.g. `&str` for lex bounds.
    pub fn admits_from_below<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: PartialOrd + ?Sized,
    {
        match self {
            Boundary::NegInf => true,
            Boundary::PosInf => false,
            Boundary::Inclusive(b) => value >= <T as Borrow<Q>>::borrow(b),
            Boundary::Exclusive(b) => value > <T as Borrow<Q>>::borrow(b),
        }
    }

    /// True if `value` lies on the admitted side of this boundary used as a maximum.
    pub fn admits_from_above<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: PartialOrd + ?Sized,
    {
        match self {
            Boundary::NegInf => false,
            Boundary::PosInf => true,
            Boundary::Inclusive(b) => value <= <T as Borrow<Q>>::borrow(b),
            Boundary::Exclusive(b) => value < <T as Borrow<Q>>::borrow(b),
        }
    }
}

impl Boundary<String> {
    /// Parses a lexicographic boundary (`-`, `+`, `[member`, `(member`).
    pub fn parse_lex(input: &str) -> StoreResult<Self> {
        match input {
            "-" => Ok(Boundary::NegInf),
            "+" => Ok(Boundary::PosInf),
            _ => {
                if let Some(rest) = input.strip_prefix('[') {
                    Ok(Boundary::Inclusive(rest.to_string()))
                } else if let Some(rest) = input.strip_prefix('(') {
                    Ok(Boundary::Exclusive(rest.to_string()))
                } else {
                    Err(StoreError::invalid(format!(
                        "min or max not valid string range item: '{}'",
                        input
                    )))
                }
            }
        }
    }
}

impl Boundary<f64> {
    /// Parses a score boundary (`-inf`, `+inf`, `-`, `+`, `1.5`, `[1.5`, `(1.5`).
    pub fn parse_score(input: &str) -> StoreResult<Self> {
        match input.to_ascii_lowercase().as_str() {
            "-" | "-inf" => return Ok(Boundary::NegInf),
            "+" | "+inf" | "inf" => return Ok(Boundary::PosInf),
            _ => {}
        }

        let (exclusive, number) = if let Some(rest) = input.strip_prefix('(') {
            (true, rest)
        } else if let Some(rest) = input.strip_prefix('[') {
            (false, rest)
        } else {
            (false, input)
        };

        let value = parse_score_value(number)?;
        Ok(if exclusive {
            Boundary::Exclusive(value)
        } else {
            Boundary::Inclusive(value)
        })
    }
}

/// Parses a score, accepting the usual `inf` spellings and rejecting NaN.
pub fn parse_score_value(input: &str) -> StoreResult<f64> {
    let value = match input.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other
            .parse::<f64>()
            .map_err(|_| StoreError::invalid(format!("min or max is not a float: '{}'", input)))?,
    };
    if value.is_nan() {
        return Err(StoreError::invalid("score range bound is NaN"));
    }
    Ok(value)
}

/// A pair of boundaries: the full predicate a range query filters with.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec<T> {
    pub min: Boundary<T>,
    pub max: Boundary<T>,
}

/// Score interval used by `ZRANGEBYSCORE`, `ZCOUNT`, ...
pub type ScoreRange = RangeSpec<f64>;

/// Member interval used by `ZRANGEBYLEX`, `ZLEXCOUNT`, ...
pub type LexRange = RangeSpec<String>;

impl<T> RangeSpec<T> {
    pub fn new(min: Boundary<T>, max: Boundary<T>) -> Self {
        Self { min, max }
    }

    /// True if `value` satisfies both boundaries.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: PartialOrd + ?Sized,
    {
        self.min.admits_from_below(value) && self.max.admits_from_above(value)
    }
}

impl<T> RangeSpec<T> {
    /// The range that admits everything.
    pub fn all() -> Self {
        Self::new(Boundary::NegInf, Boundary::PosInf)
    }
}

impl RangeSpec<String> {
    /// Parses both ends of a lex range, e.g. `("[b", "(f")`.
    pub fn parse_lex(min: &str, max: &str) -> StoreResult<Self> {
        Ok(Self::new(Boundary::parse_lex(min)?, Boundary::parse_lex(max)?))
    }
}

impl RangeSpec<f64> {
    /// Parses both ends of a score range, e.g. `("(1", "+inf")`.
    pub fn parse_score(min: &str, max: &str) -> StoreResult<Self> {
        Ok(Self::new(
            Boundary::parse_score(min)?,
            Boundary::parse_score(max)?,
        ))
    }
}

/// `LIMIT offset count` as accepted by the range-by-score/lex commands.
///
/// `count == None` means "everything after `offset`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub offset: usize,
    pub count: Option<usize>,
}

impl Limit {
    pub fn new(offset: usize, count: usize) -> Self {
        Self {
            offset,
            count: Some(count),
        }
    }

    /// Applies the limit to an iterator.
    pub(crate) fn apply<I: Iterator>(self, iter: I) -> impl Iterator<Item = I::Item> {
        iter.skip(self.offset).take(self.count.unwrap_or(usize::MAX))
    }
}

/// Resolves an inclusive `start..=stop` index window, where negative
/// indices count from the end, against a collection of `len` elements.
/// `None` if the window selects nothing.
pub(crate) fn clamp_window(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if start < 0 { len.saturating_add(start).max(0) } else { start };
    let stop = if stop < 0 { len.saturating_add(stop) } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lex() {
        assert_eq!(Boundary::parse_lex("-").unwrap(), Boundary::NegInf);
        assert_eq!(Boundary::parse_lex("+").unwrap(), Boundary::PosInf);
        assert_eq!(
            Boundary::parse_lex("[b").unwrap(),
            Boundary::Inclusive("b".to_string())
        );
        assert_eq!(
            Boundary::parse_lex("(f").unwrap(),
            Boundary::Exclusive("f".to_string())
        );
        assert!(Boundary::parse_lex("b").is_err());
        assert!(Boundary::parse_lex("").is_err());
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(Boundary::parse_score("-inf").unwrap(), Boundary::NegInf);
        assert_eq!(Boundary::parse_score("+inf").unwrap(), Boundary::PosInf);
        assert_eq!(
            Boundary::parse_score("1.5").unwrap(),
            Boundary::Inclusive(1.5)
        );
        assert_eq!(
            Boundary::parse_score("(2").unwrap(),
            Boundary::Exclusive(2.0)
        );
        assert_eq!(
            Boundary::parse_score("[3").unwrap(),
            Boundary::Inclusive(3.0)
        );
        assert!(Boundary::parse_score("abc").is_err());
        assert!(Boundary::parse_score("nan").is_err());
    }

    #[test]
    fn test_lex_contains() {
        let range = LexRange::parse_lex("[b", "(f").unwrap();
        let inside: Vec<&str> = ["a", "b", "c", "d", "e", "f", "g"]
            .into_iter()
            .filter(|m| range.contains(*m))
            .collect();
        assert_eq!(inside, vec!["b", "c", "d", "e"]);

        let all = LexRange::parse_lex("-", "+").unwrap();
        assert!(all.contains(&"anything".to_string()));

        let empty = LexRange::parse_lex("+", "-").unwrap();
        assert!(!empty.contains(&"anything".to_string()));
    }

    #[test]
    fn test_lex_contains_borrowed_and_owned_agree() {
        let range = LexRange::parse_lex("(b", "[d").unwrap();
        for member in ["a", "b", "c", "d", "e"] {
            assert_eq!(range.contains(member), range.contains(&member.to_string()));
        }
        assert!(range.contains("c"));
        assert!(!range.contains("b"));
    }

    #[test]
    fn test_clamp_window() {
        assert_eq!(clamp_window(0, -1, 4), Some((0, 3)));
        assert_eq!(clamp_window(-2, 100, 4), Some((2, 3)));
        assert_eq!(clamp_window(-100, 0, 4), Some((0, 0)));
        assert_eq!(clamp_window(3, 1, 4), None);
        assert_eq!(clamp_window(4, 10, 4), None);
        assert_eq!(clamp_window(0, -1, 0), None);
        assert_eq!(clamp_window(i64::MIN, i64::MAX, 3), Some((0, 2)));
    }

    #[test]
    fn test_score_contains() {
        let range = ScoreRange::parse_score("(1", "3").unwrap();
        assert!(!range.contains(&1.0));
        assert!(range.contains(&1.5));
        assert!(range.contains(&3.0));
        assert!(!range.contains(&3.1));

        assert!(ScoreRange::all().contains(&f64::INFINITY));
    }

    #[test]
    fn test_limit() {
        let taken: Vec<i32> = Limit::new(1, 2).apply(1..10).collect();
        assert_eq!(taken, vec![2, 3]);

        let rest: Vec<i32> = Limit {
            offset: 7,
            count: None,
        }
        .apply(1..10)
        .collect();
        assert_eq!(rest, vec![8, 9]);
    }
}
