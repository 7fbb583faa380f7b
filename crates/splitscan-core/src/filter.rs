//! Single-column value filters.
//!
//! Used both for subfield filters carried by table handles and for dynamic
//! filters pushed into a running data source. A filter never matches a null
//! unless it is `IsNull`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::Scalar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    IsNull,
    IsNotNull,
    Equal {
        value: Scalar,
    },
    In {
        values: Vec<Scalar>,
    },
    Range {
        lower: Option<Scalar>,
        lower_inclusive: bool,
        upper: Option<Scalar>,
        upper_inclusive: bool,
    },
    Not {
        filter: Box<Filter>,
    },
}

impl Filter {
    pub fn equal(value: Scalar) -> Self {
        Filter::Equal { value }
    }

    /// Inclusive `[lower, upper]`.
    pub fn between(lower: Scalar, upper: Scalar) -> Self {
        Filter::Range {
            lower: Some(lower),
            lower_inclusive: true,
            upper: Some(upper),
            upper_inclusive: true,
        }
    }

    pub fn test(&self, value: &Scalar) -> bool {
        match self {
            Filter::IsNull => value.is_null(),
            Filter::IsNotNull => !value.is_null(),
            Filter::Equal { value: v } => value.compare(v) == Some(Ordering::Equal),
            Filter::In { values } => values
                .iter()
                .any(|v| value.compare(v) == Some(Ordering::Equal)),
            Filter::Range {
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
            } => {
                if value.is_null() {
                    return false;
                }
                let lower_ok = match lower {
                    None => true,
                    Some(lo) => match value.compare(lo) {
                        Some(Ordering::Greater) => true,
                        Some(Ordering::Equal) => *lower_inclusive,
                        _ => false,
                    },
                };
                let upper_ok = match upper {
                    None => true,
                    Some(hi) => match value.compare(hi) {
                        Some(Ordering::Less) => true,
                        Some(Ordering::Equal) => *upper_inclusive,
                        _ => false,
                    },
                };
                lower_ok && upper_ok
            }
            Filter::Not { filter } => !value.is_null() && !filter.test(value),
        }
    }

    /// Evaluate against a whole column, producing a keep-mask.
    pub fn test_all(&self, values: &[Scalar]) -> Vec<bool> {
        values.iter().map(|v| self.test(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_only_match_is_null() {
        assert!(Filter::IsNull.test(&Scalar::Null));
        assert!(!Filter::IsNotNull.test(&Scalar::Null));
        assert!(!Filter::equal(Scalar::I64(1)).test(&Scalar::Null));
        assert!(!Filter::between(Scalar::I64(0), Scalar::I64(9)).test(&Scalar::Null));
        let not_one = Filter::Not {
            filter: Box::new(Filter::equal(Scalar::I64(1))),
        };
        assert!(!not_one.test(&Scalar::Null));
        assert!(not_one.test(&Scalar::I64(2)));
    }

    #[test]
    fn range_bounds() {
        let f = Filter::Range {
            lower: Some(Scalar::I32(10)),
            lower_inclusive: false,
            upper: Some(Scalar::I32(20)),
            upper_inclusive: true,
        };
        assert!(!f.test(&Scalar::I64(10)));
        assert!(f.test(&Scalar::I64(11)));
        assert!(f.test(&Scalar::I64(20)));
        assert!(!f.test(&Scalar::I64(21)));
        assert!(!f.test(&Scalar::Str("15".into())));
    }

    #[test]
    fn in_list_and_serde() {
        let f = Filter::In {
            values: vec![Scalar::Str("a".into()), Scalar::Str("c".into())],
        };
        assert_eq!(
            f.test_all(&[
                Scalar::Str("a".into()),
                Scalar::Str("b".into()),
                Scalar::Str("c".into())
            ]),
            vec![true, false, true]
        );
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["kind"], "in");
        let back: Filter = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }
}
