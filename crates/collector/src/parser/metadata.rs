//! 작업 메타데이터 (`<stem>.json`) 디코더

use std::path::Path;

use amtlog_core::types::TaskId;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CollectorError;

/// 출력 파일 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutFile {
    pub path: String,
    pub srcbitrate: u64,
    pub outbitrate: u64,
    pub outfilesize: u64,
    #[serde(default)]
    pub subs: Vec<String>,
}

/// 음성 드리프트 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDiff {
    #[serde(rename = "totalsrcframes")]
    pub total_src_frames: u64,
    #[serde(rename = "totaloutframes")]
    pub total_out_frames: u64,
    #[serde(rename = "totaloutuniqueframes")]
    pub total_out_unique_frames: u64,
    #[serde(rename = "notincludedper")]
    pub not_included_per: f64,
    #[serde(rename = "avgdiff")]
    pub avg_diff: f64,
    #[serde(rename = "maxdiff")]
    pub max_diff: f64,
    #[serde(rename = "maxdiffpos")]
    pub max_diff_pos: f64,
}

/// 스트림 오류 코드별 발생 횟수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ErrorHistogram {
    pub unknown_pts: u64,
    pub decode_packet_failed: u64,
    pub h264_pts_mismatch: u64,
    pub h264_unexpected_field: u64,
    pub non_continuous_pts: u64,
    pub no_drcs_map: u64,
    pub decode_audio_failed: u64,
}

impl ErrorHistogram {
    pub fn total(&self) -> u64 {
        self.unknown_pts
            + self.decode_packet_failed
            + self.h264_pts_mismatch
            + self.h264_unexpected_field
            + self.non_continuous_pts
            + self.no_drcs_map
            + self.decode_audio_failed
    }
}

/// 메타데이터 JSON의 필드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFields {
    pub srcpath: String,
    #[serde(default)]
    pub outfiles: Vec<OutFile>,
    #[serde(default)]
    pub logofiles: Vec<String>,
    pub srcfilesize: u64,
    pub intvideofilesize: u64,
    pub outfilesize: u64,
    pub srcduration: f64,
    pub outduration: f64,
    /// `null`이나 빈 객체는 통계 없음으로 취급
    #[serde(default, deserialize_with = "empty_as_none")]
    pub audiodiff: Option<AudioDiff>,
    #[serde(default)]
    pub error: ErrorHistogram,
    pub cmanalyze: bool,
    #[serde(default)]
    pub nicojk: bool,
    #[serde(default)]
    pub trimavs: bool,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<AudioDiff>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => AudioDiff::deserialize(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// 태스크 하나의 메타데이터
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// 파일명 stem
    pub task_id: TaskId,
    /// `srcpath`의 파일명 stem
    pub program_name: String,
    pub fields: MetadataFields,
    /// 조건 규칙 평가용 원본 JSON 객체
    pub raw: serde_json::Value,
}

impl MetadataRecord {
    /// 파일 경로와 내용으로 레코드를 만듭니다.
    ///
    /// # Errors
    /// 태스크 ID가 아닌 파일명, JSON 객체가 아닌 내용, 필수 필드 누락은
    /// [`CollectorError::MalformedInput`]
    pub fn from_slice(path: &Path, content: &[u8]) -> Result<Self, CollectorError> {
        let malformed = |reason: String| CollectorError::MalformedInput {
            path: path.display().to_string(),
            reason,
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| malformed("file name has no stem".to_owned()))?;
        let task_id = TaskId::parse(stem).map_err(|e| malformed(e.to_string()))?;

        let raw: serde_json::Value = serde_json::from_slice(content)
            .map_err(|e| malformed(format!("invalid JSON: {e}")))?;
        if !raw.is_object() {
            return Err(malformed("expected a JSON object".to_owned()));
        }

        let fields = MetadataFields::deserialize(&raw)
            .map_err(|e| malformed(format!("invalid metadata: {e}")))?;
        let program_name = program_name_from(&fields.srcpath);

        Ok(Self {
            task_id,
            program_name,
            fields,
            raw,
        })
    }

    /// 첫 번째 출력 파일 경로
    pub fn first_out_path(&self) -> Option<&str> {
        self.fields.outfiles.first().map(|f| f.path.as_str())
    }
}

/// 경로의 마지막 구성요소에서 확장자를 뗀 이름
///
/// 인코딩 호스트의 경로 구분자가 `\`일 수 있으므로 두 구분자를 모두 처리합니다.
pub fn program_name_from(srcpath: &str) -> String {
    let file_name = srcpath
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(srcpath);
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name[..idx].to_owned(),
        _ => file_name.to_owned(),
    }
}
