#![no_main]

use std::path::Path;
use std::sync::OnceLock;

use amtlog_collector::LogParser;
use libfuzzer_sys::fuzz_target;

fn parser() -> &'static LogParser {
    static PARSER: OnceLock<LogParser> = OnceLock::new();
    PARSER.get_or_init(|| LogParser::with_defaults().expect("builtin patterns compile"))
}

fuzz_target!(|data: &[u8]| {
    // 텍스트 로그는 UTF-8만 허용
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(result) = parser().parse_text_str(text, Path::new("fuzz.txt")) {
            assert_eq!(result.phases.len(), 4);
        }
    }
});
