#![no_main]

use amtlog_collector::RuleLoader;
use amtlog_collector::rule::CompiledRule;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    let Ok(yaml_str) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(rules) = RuleLoader::parse_yaml(yaml_str, "fuzz-input.yml") else {
        return;
    };
    for rule in &rules {
        let _ = CompiledRule::compile(rule);
    }
});
