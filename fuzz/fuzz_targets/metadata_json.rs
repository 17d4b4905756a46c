#![no_main]

use std::path::Path;

use amtlog_collector::{LogParser, MetadataRecord};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let path = Path::new("2025-10-18_120000.000.json");
    let Ok(metadata) = MetadataRecord::from_slice(path, data) else {
        return;
    };

    // 디코딩에 성공한 메타데이터는 통합과 직렬화도 패닉 없이 끝나야 함
    let Ok(parser) = LogParser::with_defaults() else {
        return;
    };
    let Ok(text) = parser.parse_text_str("AmatsukazeCLI\n", Path::new("fuzz.txt")) else {
        return;
    };
    let event = parser.integrate(&text, &metadata, "fuzz", "fuzz-host");
    let _ = serde_json::to_vec(&event);
});
