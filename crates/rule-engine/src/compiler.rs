//! 规则编译器
//!
//! 将规则字符串编译为 AST，以及把多条规则用 OR 合并为一棵树。

use crate::error::{Result, RuleError};
use crate::models::{AstNode, MAX_AST_DEPTH};
use crate::parser;
use tracing::{debug, warn};

/// 从规则字符串构建 AST
///
/// 支持 `rule1 = "age > 30 AND department = 'Sales'"` 形式的赋值包装：
/// 先解析引号内的表达式，失败时再把整个字符串当作表达式解析，
/// 两者都失败时返回前者的错误。不会产生部分树。
pub fn create_rule(rule_string: &str) -> Result<AstNode> {
    debug!(rule = %rule_string, "收到规则字符串");

    let Some(expression) = parser::extract_expression(rule_string) else {
        return compile_expression(rule_string);
    };

    debug!(expression = %expression, "从赋值形式中提取规则表达式");
    match compile_expression(expression) {
        Ok(ast) => Ok(ast),
        Err(e) => {
            debug!(error = %e, "提取的表达式无效，按完整字符串解析");
            compile_expression(rule_string).map_err(|_| e)
        }
    }
}

fn compile_expression(expression: &str) -> Result<AstNode> {
    let normalized = parser::normalize(expression);
    debug!(normalized = %normalized, "规则字符串归一化完成");

    let expr = parser::parse_expression(&normalized)?;
    let ast = parser::lower(&expr)?;

    debug!(
        root = %ast,
        operands = ast.operand_count(),
        depth = ast.depth(),
        "AST 构建完成"
    );
    Ok(ast)
}

/// 合并多条规则
///
/// 无效规则记录日志后跳过；第一条有效规则作为初始树，之后每条有效规则
/// 以 `OR(当前树, 新规则)` 的方式合并，得到按输入顺序左倾的 OR 链。
/// 合并结果深度超过 [`MAX_AST_DEPTH`] 时返回错误。
pub fn combine_rules<I, S>(rules: I) -> Result<AstNode>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut combined: Option<(AstNode, usize)> = None;

    for (index, rule) in rules.into_iter().enumerate() {
        let rule = rule.as_ref();
        let ast = match create_rule(rule) {
            Ok(ast) => ast,
            Err(e) => {
                warn!(index, rule = %rule, error = %e, "跳过无效规则");
                continue;
            }
        };
        let depth = ast.depth();

        combined = Some(match combined {
            None => {
                debug!(index, "以第一条有效规则初始化合并树");
                (ast, depth)
            }
            Some((current, current_depth)) => {
                let depth = current_depth.max(depth) + 1;
                if depth > MAX_AST_DEPTH {
                    warn!(index, max_depth = MAX_AST_DEPTH, "合并树超过深度上限");
                    return Err(RuleError::CombinedTooDeep(MAX_AST_DEPTH));
                }
                debug!(index, "以 OR 合并规则");
                (AstNode::or(current, ast), depth)
            }
        });
    }

    combined.map(|(ast, _)| ast).ok_or_else(|| {
        warn!("没有可合并的有效规则");
        RuleError::NoValidRules
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rule() {
        let ast = create_rule("age > 30 AND department = 'Sales'").unwrap();
        assert_eq!(
            ast,
            AstNode::and(
                AstNode::operand("age Gt 30"),
                AstNode::operand("department Eq 'Sales'")
            )
        );
    }

    #[test]
    fn test_create_rule_with_assignment() {
        let ast = create_rule(r#"rule1 = "age >= 18 OR vip = 'yes'""#).unwrap();
        assert_eq!(
            ast,
            AstNode::or(
                AstNode::operand("age GtE 18"),
                AstNode::operand("vip Eq 'yes'")
            )
        );
    }

    #[test]
    fn test_create_rule_with_quotes_inside_assignment() {
        let ast = create_rule(r#"rule1 = "age > 30 AND department = "Sales"""#).unwrap();
        assert_eq!(
            ast,
            AstNode::and(
                AstNode::operand("age Gt 30"),
                AstNode::operand("department Eq 'Sales'")
            )
        );
    }

    #[test]
    fn test_plain_comparison_matching_assignment_shape() {
        assert_eq!(
            create_rule("department = 'Sales'").unwrap(),
            AstNode::operand("department Eq 'Sales'")
        );
        assert_eq!(
            create_rule("department = 'Sales' AND region = 'East'").unwrap(),
            AstNode::and(
                AstNode::operand("department Eq 'Sales'"),
                AstNode::operand("region Eq 'East'")
            )
        );
    }

    #[test]
    fn test_create_rule_is_deterministic() {
        let rule = "((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)";
        assert_eq!(create_rule(rule).unwrap(), create_rule(rule).unwrap());
    }

    #[test]
    fn test_create_rule_errors() {
        assert!(create_rule("age > 30 AND").is_err());
        assert!(create_rule("f(x) > 1").is_err());
        assert!(create_rule("not valid $$").is_err());
    }

    #[test]
    fn test_combine_rules() {
        let ast = combine_rules(["age > 30", "department = 'Sales'", "salary > 1000"]).unwrap();
        let expected = AstNode::or(
            AstNode::or(
                AstNode::operand("age Gt 30"),
                AstNode::operand("department Eq 'Sales'"),
            ),
            AstNode::operand("salary Gt 1000"),
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_combine_skips_invalid_rules() {
        let ast = combine_rules(vec![
            "not valid $$".to_string(),
            "age > 30".to_string(),
            "age >".to_string(),
        ])
        .unwrap();
        assert_eq!(ast, AstNode::operand("age Gt 30"));
    }

    #[test]
    fn test_combine_depth_limit() {
        let within: Vec<String> = (0..MAX_AST_DEPTH).map(|i| format!("a > {}", i)).collect();
        assert_eq!(combine_rules(&within).unwrap().operand_count(), MAX_AST_DEPTH);

        let too_many: Vec<String> = (0..20_000).map(|i| format!("a > {}", i)).collect();
        let err = combine_rules(&too_many).unwrap_err();
        assert!(matches!(err, RuleError::CombinedTooDeep(max) if max == MAX_AST_DEPTH));
    }

    #[test]
    fn test_combine_without_valid_rules() {
        let empty: [&str; 0] = [];
        assert!(matches!(combine_rules(empty), Err(RuleError::NoValidRules)));
        assert!(matches!(
            combine_rules(["not valid $$"]),
            Err(RuleError::NoValidRules)
        ));
    }
}
