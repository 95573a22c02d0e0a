use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::content::ExtractedContent;
use crate::upload::MediaType;

// ── Prompt text ──────────────────────────────────────────────────────────────

// Parsing downstream is line-anchored on these labels; keep them exact.
pub const HEADLINE_LABEL: &str = "제목:";
pub const PRESS_LABEL: &str = "언론사:";

const ANSWER_FORMAT: &str = "분석 후 다음 형식으로만 답변해주세요. 다른 설명은 덧붙이지 마세요:\n\
제목: [정확한 뉴스 제목]\n\
언론사: [언론사명]";

const IMAGE_ACCURACY_GUIDE: &str = "이 뉴스 기사 이미지를 자세히 읽고 분석해주세요. 특히 다음 사항에 주의해주세요:\n\n\
1. 기사의 전체 맥락을 정확히 파악하세요.\n\
2. 이미지의 글자를 옮길 때 오타나 잘못 읽은 글자가 없도록 주의하세요.\n\
3. 발음이 같거나 비슷한 단어를 혼동하지 말고 문맥에 맞는 단어를 사용하세요.\n\
4. 한자어, 외래어, 전문용어는 기사에 쓰인 정확한 한글 표기를 사용하세요.";

const TEXT_ANALYSIS_INTRO: &str = "다음은 PDF에서 추출한 뉴스 기사 본문입니다. 기사를 자세히 읽고 분석해주세요.";

const SUMMARY_GUIDE: &str = "이 뉴스 기사를 자세히 읽고 다음 지침에 따라 요약해주세요:\n\n\
1. 기사의 핵심 내용을 정확하게 파악하세요.\n\
2. 숫자와 날짜는 원문 그대로 정확하게 표기하세요.\n\
3. 오타나 맥락 오류가 없도록 주의하세요.\n\
4. 번호나 글머리 기호 없이 문장만 작성하세요.\n\n\
두 문장이 자연스러운 연결 표현으로 이어지도록 2개의 문장으로 요약해주세요.";

// ── Payload types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Metadata,
    Summary,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Metadata => "metadata",
            Purpose::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    /// Base64 data plus the media type it was uploaded as.
    Image { media_type: String, data: String },
}

/// Ordered blocks for one generation call. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub purpose: Purpose,
    pub blocks: Vec<ContentBlock>,
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub fn build(content: &ExtractedContent, purpose: Purpose) -> PromptPayload {
    let blocks = match (content, purpose) {
        (ExtractedContent::Text { plain_text }, Purpose::Metadata) => vec![ContentBlock::Text(
            format!(
                "{}\n\n<article>\n{}\n</article>\n\n{}",
                TEXT_ANALYSIS_INTRO, plain_text, ANSWER_FORMAT
            ),
        )],
        (ExtractedContent::Text { plain_text }, Purpose::Summary) => vec![ContentBlock::Text(
            format!("{}\n\n<article>\n{}\n</article>", SUMMARY_GUIDE, plain_text),
        )],
        (ExtractedContent::Image { bytes, media_type }, Purpose::Metadata) => vec![
            ContentBlock::Text(format!("{}\n\n{}", IMAGE_ACCURACY_GUIDE, ANSWER_FORMAT)),
            image_block(bytes, *media_type),
        ],
        (ExtractedContent::Image { bytes, media_type }, Purpose::Summary) => vec![
            ContentBlock::Text(SUMMARY_GUIDE.to_string()),
            image_block(bytes, *media_type),
        ],
    };

    PromptPayload { purpose, blocks }
}

fn image_block(bytes: &[u8], media_type: MediaType) -> ContentBlock {
    ContentBlock::Image {
        media_type: media_type.as_mime().to_string(),
        data: BASE64.encode(bytes),
    }
}
