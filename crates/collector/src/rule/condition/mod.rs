//! 조건 규칙 표현식 언어
//!
//! 점 경로로 메타데이터 필드를 참조하는 제한된 불리언 표현식을 해석합니다.
//!
//! ```text
//! audiodiff.maxdiff > 100 and audiodiff.maxdiff < 200
//! encoder in ['QSVEnc', 'NVEnc'] and not trimavs
//! srcfilesize / outfilesize >= 10
//! ```
//!
//! 지원: 비교(`== != < <= > >=`, 연쇄 비교), 불리언(`and or not`), 산술
//! (`+ - * / % **`), 괄호, 멤버십(`in`, `not in`), 숫자/문자열/불리언/`None` 리터럴,
//! 리스트 리터럴, 점 경로 조회.
//!
//! 지원하지 않음: 함수 호출, 데이터 밖의 속성 접근, 대입 등 부수 효과.
//!
//! 데이터에 없는 필드를 참조하면 규칙은 `false`로 평가됩니다. 그 외의 평가
//! 실패(타입 불일치, 0으로 나누기, 문법 오류)는 규칙 설정 오류로 보고됩니다.

mod eval;
mod lexer;
mod parser;

use crate::error::CollectorError;

use eval::EvalError;
use parser::Expr;

/// 미리 파싱된 조건식
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// 조건식을 파싱합니다. 실패 사유는 사람이 읽을 수 있는 문자열입니다.
    pub fn compile(source: &str) -> Result<Self, String> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_owned(),
            expr,
        })
    }

    /// 원본 조건식
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 데이터에 대해 조건식을 평가합니다.
    ///
    /// 정의되지 않은 필드 참조는 `Ok(false)`입니다.
    pub fn evaluate(&self, data: &serde_json::Value) -> Result<bool, String> {
        match eval::evaluate(&self.expr, data) {
            Ok(value) => Ok(value.is_truthy()),
            Err(EvalError::Undefined(path)) => {
                tracing::trace!(expression = %self.source, path = %path, "undefined field, rule does not match");
                Ok(false)
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

/// 조건식을 한 번 파싱하고 평가합니다.
///
/// # Errors
/// 문법 오류나 정의되지 않은 필드 이외의 평가 실패는
/// [`CollectorError::RuleConfig`]로 반환됩니다.
pub fn evaluate_custom_rule(
    expression: &str,
    data: &serde_json::Value,
) -> Result<bool, CollectorError> {
    let to_err = |reason: String| CollectorError::RuleConfig {
        rule: expression.to_owned(),
        reason,
    };
    Condition::compile(expression)
        .map_err(to_err)?
        .evaluate(data)
        .map_err(to_err)
}
