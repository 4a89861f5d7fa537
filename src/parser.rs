use serde::Deserialize;
use serde::Serialize;

/// Raw shape of a plan file: an ordered list of `[[row]]` tables mirroring
/// the ten-column plan contract. Columns 1-7 are authored by hand, columns
/// 8-10 (`actual_status`, `actual_response`, `outcome`) are written back by
/// the engine after a run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlanFile {
    #[serde(default, rename = "row")]
    pub rows: Vec<RawRow>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub test_case: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub payload_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    #[serde(default)]
    pub expected_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}
