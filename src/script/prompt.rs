//! Persona prompt for the two-host dialogue.

/// Render the generation prompt for one article.
///
/// `content` should already be truncated to the configured budget.
pub fn build_prompt(title: &str, content: &str, requirements: Option<&str>) -> String {
    let extra = requirements
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| format!("\n[추가 요청사항] {r}\n"))
        .unwrap_or_default();

    format!(
        "당신은 청취율 1위 시사/교양 팟캐스트의 메인 작가입니다.
딱딱한 뉴스를 친구랑 수다 떨듯이 재미있고 깊이 있게 풀어내는 것이 당신의 특기입니다.
다음 뉴스 기사를 바탕으로 두 진행자(상현, 지민)가 주고받는 대본을 작성해 주세요.

[기사 정보]
- 제목: {title}
- 본문: {content}

[진행자 페르소나]
1. 상현 (남성, 메인 호스트): 차분하고 신뢰감 있는 전문가. 어려운 내용을 쉬운 비유로 설명합니다.
2. 지민 (여성, 보조 호스트): 호기심 많은 질문자. 청취자의 마음을 대변하고 리액션이 풍부합니다.

[대화 구성]
1. 도입: 지민이 기사와 관련된 가벼운 질문으로 시작합니다.
2. 전개: 상현이 핵심 내용을 설명하고 지민이 질문하며 대화를 이어갑니다. 중학교 3학년도 이해할 수 있는 쉬운 말을 씁니다.
3. 심화: 이 소식이 왜 중요한지, 우리 삶이 어떻게 바뀔지 짧게 토론합니다.
4. 마무리: 한 줄 요약이나 생각할 거리로 자연스럽게 끝냅니다. 형식적인 인사나 클로징 멘트는 넣지 않습니다.

[대화 예시]
지민: 상현 선배님, 요즘 AI가 진짜 어디까지 온 건지 모르겠어요.
상현: 맞아요, 정말 빠르게 발전하고 있죠. 오늘 이 기사 보셨어요?
지민: 아직 못 봤는데, 무슨 내용이에요?
{extra}
[필수 제약 사항]
1. 말투: 서로 정중한 존댓말(해요체)을 사용합니다.
2. 형식: 모든 줄을 '상현: 대사' 또는 '지민: 대사' 형태로만 작성합니다. 지문, 해설, 괄호 설명은 금지합니다.
3. 길이: 대화는 최소 12회 이상 주고받습니다.
4. 특수문자: 대사에 별표, 샵, 물결, 캐럿, 백틱을 넣지 않습니다.
5. 대본만 출력합니다. 지시사항을 대본에 포함하지 않습니다.
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_article() {
        let p = build_prompt("AI 진단", "본문 내용", None);
        assert!(p.contains("- 제목: AI 진단"));
        assert!(p.contains("- 본문: 본문 내용"));
        assert!(!p.contains("[추가 요청사항]"));
    }

    #[test]
    fn test_prompt_appends_requirements() {
        let p = build_prompt("t", "c", Some(" 투자 관점에서 설명 "));
        assert!(p.contains("[추가 요청사항] 투자 관점에서 설명\n"));
        assert!(!build_prompt("t", "c", Some("  ")).contains("[추가 요청사항]"));
    }
}
