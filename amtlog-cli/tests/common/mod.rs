use std::path::{Path, PathBuf};

pub const TASK: &str = "2025-10-18_120000.000";

/// Write `amtlog.toml` for a temp dir; `extra` is appended verbatim.
pub fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("amtlog.toml");
    let content = format!(
        r#"
[general]
environment = "test"
host = "encoder01"

[watcher]
log_directory = "{logs}"

[vector]
endpoint = "http://user:pw@vector.local:9000/amatsukaze"
auth_token = "s3cret"

[ledger]
path = "{ledger}"
{extra}
"#,
        logs = dir.display(),
        ledger = dir.join("ledger.db").display(),
    );
    std::fs::write(&path, content).unwrap();
    path
}

pub fn metadata_json() -> String {
    serde_json::json!({
        "srcpath": "/rec/ニュース.ts",
        "outfiles": [{"path": "/out/ニュース.mp4", "srcbitrate": 16000, "outbitrate": 4000, "outfilesize": 3_000_000_000u64}],
        "logofiles": [],
        "srcfilesize": 12_000_000_000u64,
        "intvideofilesize": 8_000_000_000u64,
        "outfilesize": 3_000_000_000u64,
        "srcduration": 1800.0,
        "outduration": 1799.0,
        "error": {},
        "cmanalyze": true
    })
    .to_string()
}

/// Write a `(txt, json)` pair and return the metadata path.
pub fn write_task(dir: &Path, text: &str) -> PathBuf {
    std::fs::write(dir.join(format!("{TASK}.txt")), text).unwrap();
    let json = dir.join(format!("{TASK}.json"));
    std::fs::write(&json, metadata_json()).unwrap();
    json
}
