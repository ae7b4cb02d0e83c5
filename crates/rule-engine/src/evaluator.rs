//! 规则评估器
//!
//! 对 AST 进行递归求值。逻辑节点的两侧总是都会被求值（不做短路），
//! 因此右侧的数据错误即使在左侧已决定结果时也会暴露出来。

use crate::error::{Result, RuleError};
use crate::models::{AstNode, DataRecord, json_type_name};
use crate::operators::Comparator;
use serde_json::Value;
use tracing::debug;

/// 操作数字符串拆分后的三部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandParts<'a> {
    pub field: &'a str,
    pub comparator: Comparator,
    pub literal: &'a str,
}

impl<'a> OperandParts<'a> {
    /// 按单个空格拆分为 `字段 标签 常量`，常量部分可以包含空格
    pub fn parse(value: &'a str) -> Result<Self> {
        let mut parts = value.splitn(3, ' ');
        let (Some(field), Some(tag), Some(literal)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(RuleError::InvalidOperand(value.to_string()));
        };

        Ok(Self {
            field,
            comparator: tag.parse()?,
            literal,
        })
    }
}

/// 规则评估器
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// 评估整棵树
    pub fn evaluate(node: &AstNode, record: &DataRecord) -> Result<bool> {
        match node {
            AstNode::Operand { value } => Self::evaluate_operand(value, record),
            AstNode::Operator {
                operator,
                left,
                right,
            } => {
                let left_result = Self::evaluate(left, record)?;
                let right_result = Self::evaluate(right, record)?;
                let result = operator.apply(left_result, right_result);
                debug!(
                    operator = %operator,
                    left = left_result,
                    right = right_result,
                    result,
                    "逻辑节点求值"
                );
                Ok(result)
            }
        }
    }

    /// 评估单个比较
    ///
    /// 比较方式由用户数据中字段的类型决定：整数字段要求常量可解析为整数，
    /// 字符串字段要求常量带单引号。
    fn evaluate_operand(value: &str, record: &DataRecord) -> Result<bool> {
        let OperandParts {
            field,
            comparator,
            literal,
        } = OperandParts::parse(value)?;

        let data_value = record
            .get(field)
            .ok_or_else(|| RuleError::FieldNotFound(field.to_string()))?;

        let result = match data_value {
            Value::Number(n) if n.is_i64() || n.is_u64() => {
                let expected = Self::parse_integer(field, literal)?;
                let actual = n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
                match actual {
                    Some(actual) => comparator.apply(&actual, &i128::from(expected)),
                    None => return Err(Self::unsupported(field, data_value)),
                }
            }
            Value::String(actual) => {
                let expected = Self::parse_quoted(field, literal)?;
                comparator.apply(actual.as_str(), expected)
            }
            other => return Err(Self::unsupported(field, other)),
        };

        debug!(
            field,
            comparator = %comparator,
            data = %data_value,
            literal,
            result,
            "操作数求值"
        );
        Ok(result)
    }

    fn parse_integer(field: &str, literal: &str) -> Result<i64> {
        literal.parse::<i64>().map_err(|_| RuleError::TypeMismatch {
            field: field.to_string(),
            expected: "integer".to_string(),
            actual: literal.to_string(),
        })
    }

    /// 去掉首尾的单引号
    fn parse_quoted<'a>(field: &str, literal: &'a str) -> Result<&'a str> {
        if literal.starts_with('\'') && literal.ends_with('\'') {
            Ok(literal.trim_matches('\''))
        } else {
            Err(RuleError::TypeMismatch {
                field: field.to_string(),
                expected: "string".to_string(),
                actual: literal.to_string(),
            })
        }
    }

    fn unsupported(field: &str, value: &Value) -> RuleError {
        RuleError::UnsupportedDataType {
            field: field.to_string(),
            data_type: json_type_name(value).to_string(),
        }
    }
}

/// 评估规则
pub fn evaluate_rule(ast: &AstNode, record: &DataRecord) -> Result<bool> {
    RuleEvaluator::evaluate(ast, record)
}
