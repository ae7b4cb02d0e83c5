//! 规则操作符定义

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 比较操作符
///
/// 标签形式（`Gt`、`NotEq` 等）出现在操作数字符串中，如 `age Gt 30`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    GtE,
    LtE,
    NotEq,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Self::Gt,
        Self::Lt,
        Self::Eq,
        Self::GtE,
        Self::LtE,
        Self::NotEq,
    ];

    /// 操作数字符串中使用的标签
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Gt => "Gt",
            Self::Lt => "Lt",
            Self::Eq => "Eq",
            Self::GtE => "GtE",
            Self::LtE => "LtE",
            Self::NotEq => "NotEq",
        }
    }

    /// 规则字符串中使用的符号（归一化之后）
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::GtE => ">=",
            Self::LtE => "<=",
            Self::NotEq => "!=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.symbol() == symbol)
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// 对两个同类型值执行比较
    pub fn apply<T: PartialOrd + ?Sized>(&self, left: &T, right: &T) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Lt => left < right,
            Self::Eq => left == right,
            Self::GtE => left >= right,
            Self::LtE => left <= right,
            Self::NotEq => left != right,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Comparator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| RuleError::UnsupportedComparator(s.to_string()))
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// 合并两侧的求值结果
    pub fn apply(&self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogicalOperator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(RuleError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for cmp in Comparator::ALL {
            assert_eq!(cmp.tag().parse::<Comparator>().unwrap(), cmp);
            assert_eq!(Comparator::from_symbol(cmp.symbol()), Some(cmp));
        }
    }

    #[test]
    fn test_unknown_tag() {
        let err = "Gte".parse::<Comparator>().unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_COMPARATOR");
        assert_eq!(Comparator::from_symbol("="), None);
    }

    #[test]
    fn test_apply() {
        assert!(Comparator::Gt.apply(&35, &30));
        assert!(!Comparator::Gt.apply(&30, &30));
        assert!(Comparator::GtE.apply(&30, &30));
        assert!(Comparator::Lt.apply("Marketing", "Sales"));
        assert!(Comparator::NotEq.apply("a", "b"));
        assert!(Comparator::LtE.apply(&-1, &0));
        assert!(Comparator::Eq.apply("Sales", "Sales"));
    }

    #[test]
    fn test_logical_operator() {
        assert!(LogicalOperator::Or.apply(false, true));
        assert!(!LogicalOperator::And.apply(true, false));
        assert_eq!("AND".parse::<LogicalOperator>().unwrap(), LogicalOperator::And);
        assert!("and".parse::<LogicalOperator>().is_err());
        assert_eq!(LogicalOperator::Or.to_string(), "OR");
    }
}
