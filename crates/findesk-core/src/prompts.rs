//! Prompt text compiled into the binary.

/// System persona prepended to report turns.
pub const REPORT_PERSONA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/report_persona.md"
));

/// Assistant greeting seeded into a fresh session when enabled.
pub const GREETING: &str = "안녕하세요! 금융 데이터 분석 보조 에이전트입니다. 궁금하신 점을 물어보세요.";

/// Request sent by the quick "analyze this article" action.
pub fn analyze_request(title: &str) -> String {
    format!("'{title}' 기사의 핵심 내용을 분석하고 시사점을 알려줘.")
}
