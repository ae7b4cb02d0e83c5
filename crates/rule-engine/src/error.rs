//! 规则引擎错误类型

use std::fmt;
use thiserror::Error;

/// 错误所属阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Combine,
    Evaluate,
    Deserialize,
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parse => "parse",
            Self::Combine => "combine",
            Self::Evaluate => "evaluate",
            Self::Deserialize => "deserialize",
            Self::Storage => "storage",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    // ==================== 解析错误 ====================
    #[error("规则语法错误 (位置 {position}): {message}")]
    Syntax { position: usize, message: String },

    #[error("不支持的表达式: {0}")]
    UnsupportedExpression(String),

    #[error("逻辑运算至少需要两个操作数，实际 {0} 个")]
    InsufficientOperands(usize),

    #[error("比较的左侧必须是字段名: {0}")]
    InvalidFieldName(String),

    #[error("比较的右侧必须是整数或字符串常量: {0}")]
    InvalidLiteral(String),

    #[error("只支持单一比较: {0}")]
    ChainedComparison(String),

    #[error("表达式过长: AST 深度超过 {0}")]
    ExpressionTooDeep(usize),

    // ==================== 合并错误 ====================
    #[error("没有可合并的有效规则")]
    NoValidRules,

    #[error("合并的规则过多: AST 深度超过 {0}")]
    CombinedTooDeep(usize),

    // ==================== 执行错误 ====================
    #[error("无效的操作数格式: {0}")]
    InvalidOperand(String),

    #[error("不支持的比较操作符: {0}")]
    UnsupportedComparator(String),

    #[error("不支持的逻辑操作符: {0}")]
    UnsupportedOperator(String),

    #[error("用户数据缺少字段: '{0}'")]
    FieldNotFound(String),

    #[error("类型不匹配: 字段 '{field}' 期望 {expected}, 实际 '{actual}'")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("不支持的数据类型: 字段 '{field}' 为 {data_type}")]
    UnsupportedDataType { field: String, data_type: String },

    #[error("用户数据必须是对象，实际为 {0}")]
    InvalidRecord(String),

    // ==================== 反序列化错误 ====================
    #[error("不支持的节点类型: {0}")]
    UnsupportedNodeType(String),

    #[error("节点缺少字段: {0}")]
    MissingField(String),

    #[error("节点嵌套过深: 超过 {0} 层")]
    NodeTooDeep(usize),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    // ==================== 存储错误 ====================
    #[error("规则未找到: {0}")]
    RuleNotFound(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SYNTAX_ERROR",
            Self::UnsupportedExpression(_) => "UNSUPPORTED_EXPRESSION",
            Self::InsufficientOperands(_) => "INSUFFICIENT_OPERANDS",
            Self::InvalidFieldName(_) => "INVALID_FIELD_NAME",
            Self::InvalidLiteral(_) => "INVALID_LITERAL",
            Self::ChainedComparison(_) => "CHAINED_COMPARISON",
            Self::ExpressionTooDeep(_) => "EXPRESSION_TOO_DEEP",
            Self::NoValidRules => "NO_VALID_RULES",
            Self::CombinedTooDeep(_) => "COMBINED_TOO_DEEP",
            Self::InvalidOperand(_) => "INVALID_OPERAND",
            Self::UnsupportedComparator(_) => "UNSUPPORTED_COMPARATOR",
            Self::UnsupportedOperator(_) => "UNSUPPORTED_OPERATOR",
            Self::FieldNotFound(_) => "FIELD_NOT_FOUND",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::UnsupportedDataType { .. } => "UNSUPPORTED_DATA_TYPE",
            Self::InvalidRecord(_) => "INVALID_RECORD",
            Self::UnsupportedNodeType(_) => "UNSUPPORTED_NODE_TYPE",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::NodeTooDeep(_) => "NODE_TOO_DEEP",
            Self::JsonError(_) => "JSON_ERROR",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
        }
    }

    /// 获取错误所属阶段
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Syntax { .. }
            | Self::UnsupportedExpression(_)
            | Self::InsufficientOperands(_)
            | Self::InvalidFieldName(_)
            | Self::InvalidLiteral(_)
            | Self::ChainedComparison(_)
            | Self::ExpressionTooDeep(_) => ErrorCategory::Parse,
            Self::NoValidRules | Self::CombinedTooDeep(_) => ErrorCategory::Combine,
            Self::InvalidOperand(_)
            | Self::UnsupportedComparator(_)
            | Self::FieldNotFound(_)
            | Self::TypeMismatch { .. }
            | Self::UnsupportedDataType { .. }
            | Self::InvalidRecord(_) => ErrorCategory::Evaluate,
            Self::UnsupportedOperator(_)
            | Self::UnsupportedNodeType(_)
            | Self::MissingField(_)
            | Self::NodeTooDeep(_)
            | Self::JsonError(_) => ErrorCategory::Deserialize,
            Self::RuleNotFound(_) => ErrorCategory::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = RuleError::FieldNotFound("age".to_string());
        assert_eq!(err.code(), "FIELD_NOT_FOUND");
        assert_eq!(err.category(), ErrorCategory::Evaluate);
        assert!(err.to_string().contains("'age'"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(RuleError::NoValidRules.category().to_string(), "combine");
        assert_eq!(
            RuleError::UnsupportedNodeType("leaf".to_string()).category(),
            ErrorCategory::Deserialize
        );
    }
}
