#![no_main]

use amtlog_collector::rule::Condition;
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::json;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    expression: String,
    maxdiff: f64,
    error_count: u32,
    srcpath: String,
}

fuzz_target!(|input: FuzzInput| {
    // 식 길이 제한 (성능)
    if input.expression.len() > 4096 {
        return;
    }

    let Ok(condition) = Condition::compile(&input.expression) else {
        return;
    };

    let data = json!({
        "srcpath": input.srcpath,
        "audiodiff": { "maxdiff": input.maxdiff },
        "error": { "unknown-pts": input.error_count },
        "outfiles": [],
    });

    // 평가 실패는 Err로만 나타나야 함
    let _ = condition.evaluate(&data);
});
