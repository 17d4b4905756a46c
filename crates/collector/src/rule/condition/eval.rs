//! 조건식 평가기
//!
//! 읽기 전용 JSON 데이터에 대해 AST를 평가합니다.
//! 부수 효과가 없고 데이터 경로 조회 외의 접근 수단이 없습니다.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::parser::{BinaryOp, CompareOp, Expr, UnaryOp};

/// 평가 중의 값
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "None",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Object(_) => "dict",
        }
    }

    /// 숫자로 취급할 수 있는 값 (bool은 0/1)
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Object(map) => !map.is_empty(),
        }
    }
}

/// 평가 실패
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EvalError {
    /// 데이터에 없는 필드 참조
    Undefined(String),
    /// 연산자와 피연산자 타입 불일치
    Type(String),
    DivisionByZero,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined(path) => write!(f, "name '{path}' is not defined"),
            Self::Type(reason) => write!(f, "type error: {reason}"),
            Self::DivisionByZero => f.write_str("division by zero"),
        }
    }
}

/// AST를 데이터에 대해 평가합니다.
pub(crate) fn evaluate(expr: &Expr, data: &serde_json::Value) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(segments) => lookup(data, segments),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, data))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Unary(op, operand) => {
            let value = evaluate(operand, data)?;
            unary(*op, value)
        }
        Expr::Binary(op, left, right) => {
            let lhs = evaluate(left, data)?;
            let rhs = evaluate(right, data)?;
            binary(*op, lhs, rhs)
        }
        Expr::And(left, right) => {
            let lhs = evaluate(left, data)?;
            if !lhs.is_truthy() {
                return Ok(lhs);
            }
            evaluate(right, data)
        }
        Expr::Or(left, right) => {
            let lhs = evaluate(left, data)?;
            if lhs.is_truthy() {
                return Ok(lhs);
            }
            evaluate(right, data)
        }
        Expr::Compare(first, chain) => {
            let mut left = evaluate(first, data)?;
            for (op, rhs_expr) in chain {
                let right = evaluate(rhs_expr, data)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

fn lookup(data: &serde_json::Value, segments: &[String]) -> Result<Value, EvalError> {
    let undefined = || EvalError::Undefined(segments.join("."));
    let mut current = data;

    for segment in segments {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment).ok_or_else(undefined)?,
            serde_json::Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .ok_or_else(undefined)?,
            _ => return Err(undefined()),
        };
    }

    Ok(Value::from_json(current))
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg | UnaryOp::Pos => {
            let n = value.as_number().ok_or_else(|| {
                EvalError::Type(format!("bad operand type for unary operator: '{}'", value.type_name()))
            })?;
            Ok(Value::Number(if op == UnaryOp::Neg { -n } else { n }))
        }
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    if op == BinaryOp::Add {
        match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()));
            }
            _ => {}
        }
    }

    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(EvalError::Type(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            symbol(op),
            lhs.type_name(),
            rhs.type_name()
        )));
    };

    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            // 나머지의 부호는 제수를 따름
            a - b * (a / b).floor()
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a.powf(b)
        }
    };
    Ok(Value::Number(result))
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::Ne => Ok(!values_equal(left, right)),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let Some(ordering) = order(left, right)? else {
                // NaN 비교는 항상 거짓
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn order(left: &Value, right: &Value) -> Result<Option<Ordering>, EvalError> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(a.partial_cmp(&b));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => Err(EvalError::Type(format!(
            "'<' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn contains(container: &Value, needle: &Value) -> Result<bool, EvalError> {
    match container {
        Value::List(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        Value::Str(haystack) => match needle {
            Value::Str(sub) => Ok(haystack.contains(sub.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Object(map) => match needle {
            Value::Str(key) => Ok(map.contains_key(key)),
            _ => Ok(false),
        },
        other => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;
    use serde_json::json;

    fn eval(source: &str, data: &serde_json::Value) -> Result<Value, EvalError> {
        evaluate(&parse(source).unwrap(), data)
    }

    #[test]
    fn arithmetic_follows_usual_precedence() {
        let data = json!({});
        assert_eq!(eval("1 + 2 * 3", &data), Ok(Value::Number(7.0)));
        assert_eq!(eval("(1 + 2) * 3", &data), Ok(Value::Number(9.0)));
        assert_eq!(eval("2 ** 10", &data), Ok(Value::Number(1024.0)));
        assert_eq!(eval("-7 % 3", &data), Ok(Value::Number(2.0)));
    }

    #[test]
    fn nested_path_and_array_index() {
        let data = json!({
            "audiodiff": {"maxdiff": 150.0},
            "outfiles": [{"path": "/out/a.mp4", "outbitrate": 4000}]
        });
        assert_eq!(eval("audiodiff.maxdiff", &data), Ok(Value::Number(150.0)));
        assert_eq!(
            eval("outfiles.0.path", &data),
            Ok(Value::Str("/out/a.mp4".to_owned()))
        );
    }

    #[test]
    fn missing_path_is_undefined() {
        let data = json!({"audiodiff": null});
        assert!(matches!(
            eval("audiodiff.maxdiff > 1", &data),
            Err(EvalError::Undefined(p)) if p == "audiodiff.maxdiff"
        ));
        assert!(matches!(
            eval("nothing", &data),
            Err(EvalError::Undefined(_))
        ));
    }

    #[test]
    fn equality_across_types_is_false_not_error() {
        let data = json!({"encoder": "x265"});
        assert_eq!(eval("encoder == 1", &data), Ok(Value::Bool(false)));
        assert_eq!(eval("encoder != None", &data), Ok(Value::Bool(true)));
        assert_eq!(eval("True == 1", &data), Ok(Value::Bool(true)));
    }

    #[test]
    fn ordering_mismatch_is_type_error() {
        let data = json!({"encoder": "x265"});
        assert!(matches!(
            eval("encoder > 1", &data),
            Err(EvalError::Type(_))
        ));
        assert!(matches!(eval("None < 1", &data), Err(EvalError::Type(_))));
    }

    #[test]
    fn membership_on_lists_strings_and_objects() {
        let data = json!({
            "encoder": "NVEnc",
            "command": "amatsukaze -fmt mkv",
            "error": {"unknown-pts": 3}
        });
        assert_eq!(
            eval("encoder in ['QSVEnc', 'NVEnc']", &data),
            Ok(Value::Bool(true))
        );
        assert_eq!(eval("'mkv' in command", &data), Ok(Value::Bool(true)));
        assert_eq!(eval("'unknown-pts' in error", &data), Ok(Value::Bool(true)));
        assert_eq!(eval("'x' not in command", &data), Ok(Value::Bool(true)));
        assert!(matches!(eval("1 in 2", &data), Err(EvalError::Type(_))));
    }

    #[test]
    fn boolean_operators_short_circuit() {
        let data = json!({"a": 0});
        // 오른쪽이 정의되지 않았지만 평가되지 않음
        assert_eq!(eval("a and missing", &data), Ok(Value::Number(0.0)));
        assert_eq!(eval("1 or missing", &data), Ok(Value::Number(1.0)));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let data = json!({"outfilesize": 0});
        assert_eq!(
            eval("100 / outfilesize", &data),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(eval("1 % 0", &data), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn string_concatenation() {
        let data = json!({"encoder": "x26"});
        assert_eq!(eval("encoder + '5' == 'x265'", &data), Ok(Value::Bool(true)));
        assert!(matches!(
            eval("encoder + 5", &data),
            Err(EvalError::Type(_))
        ));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::List(vec![Value::Null]).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Null.is_truthy());
    }
}
