use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ExtractionResult;

// ── Thresholds ───────────────────────────────────────────────────────────────

pub const MIN_HEADLINE_CHARS: usize = 5;
pub const MIN_PRESS_CHARS: usize = 2;
pub const MIN_SUMMARY_CHARS: usize = 10;

// ── Lazy static regexes ──────────────────────────────────────────────────────

static HEADLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*제목:[ \t]*(.*?)\r?$").unwrap());

static PRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*언론사:[ \t]*(.*?)\r?$").unwrap());

static ENUMERATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d[.)]\s?").unwrap());

static LINE_BREAKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());

// ── Error types ──────────────────────────────────────────────────────────────

/// The model ignored the requested `제목:` / `언론사:` answer format.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response has no '제목:' line")]
    MissingHeadline,
    #[error("response has no '언론사:' line")]
    MissingPress,
}

/// Well-formatted output that is too short to be a real answer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("headline is too short ({0} chars)")]
    Headline(usize),
    #[error("press name is too short ({0} chars)")]
    Press(usize),
    #[error("summary is too short ({0} chars)")]
    Summary(usize),
}

// ── Metadata ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub headline: String,
    pub press: String,
}

/// Pulls the two labelled fields out of free text. Swap this one function to
/// change how metadata is read (e.g. structured output).
pub fn parse_metadata(raw: &str) -> Result<Metadata, ParseError> {
    let headline = capture(&HEADLINE_RE, raw).ok_or(ParseError::MissingHeadline)?;
    let press = capture(&PRESS_RE, raw).ok_or(ParseError::MissingPress)?;
    Ok(Metadata { headline, press })
}

fn capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| strip_brackets(m.as_str().trim()).to_string())
}

// Models sometimes echo the placeholder brackets from the prompt. Only a
// single bracket pair wrapping the whole value counts; `[단독] ... [종합]`
// is a real headline.
fn strip_brackets(value: &str) -> &str {
    value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .filter(|inner| !inner.contains(&['[', ']'][..]))
        .map(str::trim)
        .unwrap_or(value)
}

// ── Summary ──────────────────────────────────────────────────────────────────

pub fn clean_summary(raw: &str) -> String {
    let lines: Vec<String> = raw
        .lines()
        .map(|line| ENUMERATION_RE.replace(line, "").into_owned())
        .collect();
    LINE_BREAKS_RE
        .replace_all(lines.join("\n").trim(), " ")
        .trim()
        .to_string()
}

// ── Final result ─────────────────────────────────────────────────────────────

pub fn validate(metadata: Metadata, summary: String) -> Result<ExtractionResult, ValidationError> {
    let headline_len = metadata.headline.chars().count();
    if headline_len < MIN_HEADLINE_CHARS {
        return Err(ValidationError::Headline(headline_len));
    }
    let press_len = metadata.press.chars().count();
    if press_len < MIN_PRESS_CHARS {
        return Err(ValidationError::Press(press_len));
    }
    let summary_len = summary.chars().count();
    if summary_len < MIN_SUMMARY_CHARS {
        return Err(ValidationError::Summary(summary_len));
    }

    Ok(ExtractionResult {
        headline: metadata.headline,
        press: metadata.press,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(headline: &str, press: &str) -> Metadata {
        Metadata {
            headline: headline.to_string(),
            press: press.to_string(),
        }
    }

    #[test]
    fn parses_two_labelled_lines() {
        let parsed = parse_metadata("제목: 테스트 뉴스\n언론사: 테스트신문").unwrap();
        assert_eq!(parsed, metadata("테스트 뉴스", "테스트신문"));
    }

    #[test]
    fn tolerates_preamble_and_crlf() {
        let raw = "분석 결과입니다.\r\n\r\n제목:  정부, 내년 예산 발표  \r\n언론사: 한국일보\r\n";
        let parsed = parse_metadata(raw).unwrap();
        assert_eq!(parsed, metadata("정부, 내년 예산 발표", "한국일보"));
    }

    #[test]
    fn labels_must_start_a_line() {
        let raw = "기사 제목: 무시됨\n언론사: 한겨레";
        assert_eq!(parse_metadata(raw), Err(ParseError::MissingHeadline));
    }

    #[test]
    fn missing_press_line_is_parse_error() {
        assert_eq!(
            parse_metadata("제목: 테스트 뉴스\n기자: 홍길동"),
            Err(ParseError::MissingPress)
        );
    }

    #[test]
    fn echoed_placeholder_brackets_are_removed() {
        let parsed = parse_metadata("제목: [수도권 폭우 피해 확산]\n언론사: [연합뉴스]").unwrap();
        assert_eq!(parsed, metadata("수도권 폭우 피해 확산", "연합뉴스"));
    }

    #[test]
    fn bracketed_tags_in_headline_are_kept() {
        let parsed = parse_metadata("제목: [단독] 정부 예산안 발표 [종합]\n언론사: 연합뉴스").unwrap();
        assert_eq!(parsed, metadata("[단독] 정부 예산안 발표 [종합]", "연합뉴스"));

        let parsed = parse_metadata("제목: [속보] 국회 본회의 개의\n언론사: KBS").unwrap();
        assert_eq!(parsed.headline, "[속보] 국회 본회의 개의");
    }

    #[test]
    fn empty_value_parses_then_fails_validation() {
        let parsed = parse_metadata("제목:\n언론사: 조선일보").unwrap();
        assert_eq!(parsed.headline, "");
        assert_eq!(
            validate(parsed, "충분히 긴 요약 문장입니다.".to_string()),
            Err(ValidationError::Headline(0))
        );
    }

    #[test]
    fn summary_markers_and_newlines_are_collapsed() {
        assert_eq!(
            clean_summary("1. 첫 문장입니다.\n2) 두번째 문장입니다."),
            "첫 문장입니다. 두번째 문장입니다."
        );
    }

    #[test]
    fn summary_without_markers_is_only_trimmed() {
        assert_eq!(
            clean_summary("  정부가 예산을 늘렸고,\n\n이에 따라 지원이 확대된다.  \n"),
            "정부가 예산을 늘렸고, 이에 따라 지원이 확대된다."
        );
        // Numbers inside a sentence are not markers.
        assert_eq!(clean_summary("2024년 예산은 3.5% 늘었다."), "2024년 예산은 3.5% 늘었다.");
    }

    #[test]
    fn dotted_dates_are_not_markers() {
        assert_eq!(
            clean_summary("2024. 3. 15. 정부는 예산안을 발표했다.\n이에 따라 지원이 늘어난다."),
            "2024. 3. 15. 정부는 예산안을 발표했다. 이에 따라 지원이 늘어난다."
        );
        assert_eq!(clean_summary("10. 열 번째 항목이다."), "10. 열 번째 항목이다.");
    }

    #[test]
    fn headline_boundary_is_five_chars() {
        let summary = "두 문장으로 된 충분히 긴 요약입니다.".to_string();
        assert_eq!(
            validate(metadata("네글자임", "한겨레"), summary.clone()),
            Err(ValidationError::Headline(4))
        );
        assert!(validate(metadata("다섯글자다", "한겨레"), summary).is_ok());
    }

    #[test]
    fn press_and_summary_thresholds() {
        assert_eq!(
            validate(metadata("충분한 길이 제목", "K"), "충분히 긴 요약 문장입니다.".to_string()),
            Err(ValidationError::Press(1))
        );
        assert_eq!(
            validate(metadata("충분한 길이 제목", "KBS"), "짧은 요약".to_string()),
            Err(ValidationError::Summary(5))
        );
    }

    #[test]
    fn valid_result_keeps_fields() {
        let result = validate(
            metadata("테스트 뉴스", "테스트신문"),
            "첫 문장입니다. 두번째 문장입니다.".to_string(),
        )
        .unwrap();
        assert_eq!(result.headline, "테스트 뉴스");
        assert_eq!(result.press, "테스트신문");
        assert_eq!(result.summary, "첫 문장입니다. 두번째 문장입니다.");
    }
}
