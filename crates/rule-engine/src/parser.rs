//! 规则表达式解析器
//!
//! 分三步把规则字符串变成 AST：
//! 1. 文本归一化（去掉赋值包装、关键字小写、`=` 改写为 `==`）
//! 2. 递归下降解析为语法树 [`Expr`]
//! 3. 将语法树降级为 [`AstNode`]，同时校验表达式形状
//!
//! 语法（AND 优先级高于 OR，均为左结合）：
//!
//! ```text
//! or_expr  := and_expr ("or" and_expr)*
//! and_expr := compare ("and" compare)*
//! compare  := term (cmp_op term)*
//! term     := IDENT | IDENT "(" args ")" | INT | STRING | "(" or_expr ")"
//! ```

use crate::error::{Result, RuleError};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::models::{AstNode, Condition, Literal, MAX_AST_DEPTH};
use crate::operators::{Comparator, LogicalOperator};
use regex::Regex;
use std::sync::LazyLock;

/// 括号和函数调用的嵌套上限
const MAX_NESTING: usize = 64;

static DOUBLE_QUOTED_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*\w+\s*=\s*"(.*)"\s*$"#).expect("valid assignment pattern")
});

static SINGLE_QUOTED_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*\w+\s*=\s*'(.*)'\s*$"#).expect("valid assignment pattern")
});

/// 匹配 `name = "<expr>"` 形式的赋值包装，返回引号内的文本
///
/// 贪婪匹配到最后一个同种引号，内部可以再出现同种引号。
/// `department = 'Sales'` 这类普通比较同样会匹配，是否采用由调用方决定。
pub fn extract_expression(rule: &str) -> Option<&str> {
    [&*DOUBLE_QUOTED_ASSIGNMENT, &*SINGLE_QUOTED_ASSIGNMENT]
        .into_iter()
        .find_map(|pattern| pattern.captures(rule).and_then(|c| c.get(1)))
        .map(|inner| inner.as_str())
}

/// 关键字归一化：`AND` -> `and`，`OR` -> `or`
///
/// 纯文本替换，不识别词边界，字段名和字符串常量中的 `AND`/`OR` 也会被改写。
pub fn normalize_keywords(expression: &str) -> String {
    expression.replace("AND", "and").replace("OR", "or")
}

/// 将单独的 `=` 改写为 `==`
///
/// 前一个字符是 `=`、`!`、`<`、`>` 或后一个字符是 `=` 时保持不变。
pub fn normalize_equality(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if c == '=' {
            let prev_blocks = i > 0 && matches!(chars[i - 1], '=' | '!' | '<' | '>');
            let next_blocks = chars.get(i + 1) == Some(&'=');
            if !prev_blocks && !next_blocks {
                out.push_str("==");
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// 关键字与 `=` 的完整归一化
pub fn normalize(expression: &str) -> String {
    normalize_equality(&normalize_keywords(expression))
}

/// 解析得到的语法树，尚未校验形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    BoolOp {
        operator: LogicalOperator,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        comparisons: Vec<(Comparator, Expr)>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Name(String),
    Integer(i64),
    Str(String),
}

impl Expr {
    /// 用于错误信息的简短描述
    fn describe(&self) -> String {
        match self {
            Self::BoolOp { operator, .. } => format!("逻辑表达式 {}", operator),
            Self::Compare { .. } => "比较表达式".to_string(),
            Self::Call { name, .. } => format!("函数调用 {}(...)", name),
            Self::Name(name) => format!("名称 {}", name),
            Self::Integer(i) => format!("整数 {}", i),
            Self::Str(s) => format!("字符串 '{}'", s),
        }
    }
}

/// 递归下降解析器
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
        }
    }

    fn peek(&self) -> &Token {
        // tokenize 保证末尾有 Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        let token = self.advance();
        if token.kind == kind {
            Ok(())
        } else {
            Err(RuleError::syntax(
                token.position,
                format!("期望 {}, 实际 {:?}", what, token.kind),
            ))
        }
    }

    fn parse(mut self) -> Result<Expr> {
        let expr = self.parse_or()?;
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            return Err(RuleError::syntax(
                token.position,
                format!("表达式结束后出现多余内容 {:?}", token.kind),
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut values = vec![self.parse_and()?];
        while self.peek().kind == TokenKind::Or {
            self.advance();
            values.push(self.parse_and()?);
        }
        Ok(Self::bool_op(LogicalOperator::Or, values))
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut values = vec![self.parse_compare()?];
        while self.peek().kind == TokenKind::And {
            self.advance();
            values.push(self.parse_compare()?);
        }
        Ok(Self::bool_op(LogicalOperator::And, values))
    }

    fn bool_op(operator: LogicalOperator, mut values: Vec<Expr>) -> Expr {
        if values.len() == 1 {
            values.remove(0)
        } else {
            Expr::BoolOp { operator, values }
        }
    }

    fn parse_compare(&mut self) -> Result<Expr> {
        let left = self.parse_term()?;
        let mut comparisons = Vec::new();

        while let TokenKind::Compare(cmp) = self.peek().kind {
            self.advance();
            comparisons.push((cmp, self.parse_term()?));
        }

        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::OpenParen {
                    let open = self.advance();
                    self.enter_group(open.position)?;
                    let args = self.parse_args()?;
                    self.nesting -= 1;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            TokenKind::Integer(i) => Ok(Expr::Integer(i)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::OpenParen => {
                self.enter_group(token.position)?;
                let inner = self.parse_or()?;
                self.expect(TokenKind::CloseParen, "')'")?;
                self.nesting -= 1;
                Ok(inner)
            }
            other => Err(RuleError::syntax(
                token.position,
                format!("期望字段名、常量或括号, 实际 {:?}", other),
            )),
        }
    }

    fn enter_group(&mut self, position: usize) -> Result<()> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(RuleError::syntax(position, "括号嵌套过深"));
        }
        Ok(())
    }

    /// 解析函数调用参数，左括号已被消费
    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::CloseParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            let token = self.advance();
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::CloseParen => return Ok(args),
                other => {
                    return Err(RuleError::syntax(
                        token.position,
                        format!("期望 ',' 或 ')', 实际 {:?}", other),
                    ));
                }
            }
        }
    }
}

/// 解析归一化后的表达式
pub fn parse_expression(expression: &str) -> Result<Expr> {
    let tokens = tokenize(expression)?;
    Parser::new(tokens).parse()
}

/// 将语法树降级为 AST
///
/// 多操作数的逻辑表达式从左到右折叠成二叉节点：`a and b and c` -> `(a AND b) AND c`。
/// 结果深度不超过 [`MAX_AST_DEPTH`]。
pub fn lower(expr: &Expr) -> Result<AstNode> {
    lower_with_depth(expr).map(|(node, _)| node)
}

fn lower_with_depth(expr: &Expr) -> Result<(AstNode, usize)> {
    match expr {
        Expr::BoolOp { operator, values } => {
            if values.len() < 2 {
                return Err(RuleError::InsufficientOperands(values.len()));
            }
            let (mut current, mut depth) = lower_with_depth(&values[0])?;
            for value in &values[1..] {
                let (right, right_depth) = lower_with_depth(value)?;
                depth = depth.max(right_depth) + 1;
                if depth > MAX_AST_DEPTH {
                    return Err(RuleError::ExpressionTooDeep(MAX_AST_DEPTH));
                }
                current = AstNode::operator(*operator, current, right);
            }
            Ok((current, depth))
        }
        Expr::Compare { left, comparisons } => {
            let [(comparator, right)] = comparisons.as_slice() else {
                return Err(RuleError::ChainedComparison(format!(
                    "{} 个比较操作符",
                    comparisons.len()
                )));
            };

            let field = match left.as_ref() {
                Expr::Name(name) => name.clone(),
                other => return Err(RuleError::InvalidFieldName(other.describe())),
            };

            let literal = match right {
                Expr::Integer(i) => Literal::Integer(*i),
                Expr::Str(s) => Literal::String(s.clone()),
                other => return Err(RuleError::InvalidLiteral(other.describe())),
            };

            Ok((Condition::new(field, *comparator, literal).into(), 1))
        }
        other => Err(RuleError::UnsupportedExpression(other.describe())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(expression: &str) -> Result<AstNode> {
        lower(&parse_expression(&normalize(expression))?)
    }

    #[test]
    fn test_extract_expression() {
        assert_eq!(extract_expression(r#"rule1 = "age > 30""#), Some("age > 30"));
        assert_eq!(
            extract_expression("rule1 = 'age > 30 AND\nsalary < 10'"),
            Some("age > 30 AND\nsalary < 10")
        );
        assert_eq!(
            extract_expression(r#" rule2 = "department = 'Sales'" "#),
            Some("department = 'Sales'")
        );
        assert_eq!(
            extract_expression(r#"rule1 = "age > 30 AND department = "Sales"""#),
            Some(r#"age > 30 AND department = "Sales""#)
        );
    }

    #[test]
    fn test_extract_expression_without_wrapper() {
        assert_eq!(extract_expression("age > 30"), None);
        // 引号不匹配
        assert_eq!(extract_expression(r#"r = "age > 30'"#), None);
        // 普通比较也符合包装形式
        assert_eq!(extract_expression("department = 'Sales'"), Some("Sales"));
    }

    #[test]
    fn test_normalize_keywords() {
        assert_eq!(normalize_keywords("a > 1 AND b < 2 OR c == 3"), "a > 1 and b < 2 or c == 3");
        // 已知限制：非词边界的替换
        assert_eq!(normalize_keywords("ORDER_TOTAL > 1"), "orDER_TOTAL > 1");
    }

    #[test]
    fn test_normalize_equality() {
        assert_eq!(normalize_equality("a = 1"), "a == 1");
        assert_eq!(normalize_equality("a == 1"), "a == 1");
        assert_eq!(normalize_equality("a != 1"), "a != 1");
        assert_eq!(normalize_equality("a >= 1 and b <= 2"), "a >= 1 and b <= 2");
        assert_eq!(normalize_equality("a=1 and b='x'"), "a==1 and b=='x'");
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse("age > 30").unwrap(), AstNode::operand("age Gt 30"));
        assert_eq!(
            parse("department = \"Sales\"").unwrap(),
            AstNode::operand("department Eq 'Sales'")
        );
        assert_eq!(parse("x != 0").unwrap(), AstNode::operand("x NotEq 0"));
        assert_eq!(parse("x <= 5").unwrap(), AstNode::operand("x LtE 5"));
    }

    #[test]
    fn test_parse_left_fold() {
        let ast = parse("a > 1 AND b > 2 AND c > 3").unwrap();
        let expected = AstNode::and(
            AstNode::and(AstNode::operand("a Gt 1"), AstNode::operand("b Gt 2")),
            AstNode::operand("c Gt 3"),
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let ast = parse("a > 1 OR b > 2 AND c > 3").unwrap();
        let expected = AstNode::or(
            AstNode::operand("a Gt 1"),
            AstNode::and(AstNode::operand("b Gt 2"), AstNode::operand("c Gt 3")),
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_parentheses() {
        let ast = parse("(age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')")
            .unwrap();
        let expected = AstNode::or(
            AstNode::and(
                AstNode::operand("age Gt 30"),
                AstNode::operand("department Eq 'Sales'"),
            ),
            AstNode::and(
                AstNode::operand("age Lt 25"),
                AstNode::operand("department Eq 'Marketing'"),
            ),
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(parse("f(x) > 1").unwrap_err().code(), "INVALID_FIELD_NAME");
        assert_eq!(parse("30 < age").unwrap_err().code(), "INVALID_FIELD_NAME");
        assert_eq!(parse("age > other").unwrap_err().code(), "INVALID_LITERAL");
        assert_eq!(parse("1 < age < 5").unwrap_err().code(), "CHAINED_COMPARISON");
        assert_eq!(parse("age").unwrap_err().code(), "UNSUPPORTED_EXPRESSION");
        assert_eq!(parse("f(age, 1)").unwrap_err().code(), "UNSUPPORTED_EXPRESSION");
        assert_eq!(parse("(a > 1) > 2").unwrap_err().code(), "INVALID_FIELD_NAME");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("age > 30 AND").unwrap_err().code(), "SYNTAX_ERROR");
        assert_eq!(parse("").unwrap_err().code(), "SYNTAX_ERROR");
        assert_eq!(parse("(age > 30").unwrap_err().code(), "SYNTAX_ERROR");
        assert_eq!(parse("age > 30 age").unwrap_err().code(), "SYNTAX_ERROR");
        assert_eq!(parse("age === 30").unwrap_err().code(), "SYNTAX_ERROR");
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}a > 1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse(&deep).unwrap_err().code(), "SYNTAX_ERROR");

        let shallow = format!("{}a > 1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(parse(&shallow).unwrap(), AstNode::operand("a Gt 1"));
    }

    #[test]
    fn test_call_nesting_limit() {
        let deep_calls = format!("{}x > 1", "f(".repeat(50_000));
        assert_eq!(parse(&deep_calls).unwrap_err().code(), "SYNTAX_ERROR");

        let mixed = format!("{}x > 1{}", "f((".repeat(40), "))".repeat(40));
        assert_eq!(parse(&mixed).unwrap_err().code(), "SYNTAX_ERROR");

        // 未超限的调用仍按形状校验报错
        assert_eq!(parse("f(g(x)) > 1").unwrap_err().code(), "INVALID_FIELD_NAME");
    }

    #[test]
    fn test_long_chain_depth_limit() {
        let within = vec!["a > 1"; MAX_AST_DEPTH].join(" AND ");
        assert_eq!(parse(&within).unwrap().depth(), MAX_AST_DEPTH);

        let too_long = vec!["a > 1"; 20_000].join(" AND ");
        let err = parse(&too_long).unwrap_err();
        assert_eq!(err.code(), "EXPRESSION_TOO_DEEP");
    }

    #[test]
    fn test_lower_rejects_single_operand_bool_op() {
        let expr = Expr::BoolOp {
            operator: LogicalOperator::And,
            values: vec![Expr::Name("a".to_string())],
        };
        assert_eq!(lower(&expr).unwrap_err().code(), "INSUFFICIENT_OPERANDS");
    }

    #[test]
    fn test_keyword_substitution_inside_literal() {
        // 已知限制：字符串常量中的 OR 也会被替换
        assert_eq!(
            parse("color = 'ORANGE'").unwrap(),
            AstNode::operand("color Eq 'orANGE'")
        );
    }
}
