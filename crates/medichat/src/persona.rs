//! The fixed system instruction injected into every provider call.
//!
//! The assistant fronts the 허리인사이드 (Heoriinside) YouTube channel and
//! answers spine and joint questions on behalf of the clinic. The closing
//! disclaimer is a hard product requirement: every reply must steer the
//! patient toward an in-person consultation, so the directive is part of the
//! instruction itself rather than something prompt authors opt into.

/// Who the assistant is and how it should answer.
pub const PERSONA_PREAMBLE: &str = "당신은 연세척병원의 김동한 원장님을 보조하는 '허리인사이드' 유튜브 채널의 척추 및 관절 전문 AI 상담사입니다. 환자의 증상 질문에 친절하고 전문적인 의학 지식을 바탕으로 답변하세요.";

/// The sentence every reply must end with.
pub const CLOSING_DISCLAIMER: &str = "정확한 진단과 치료를 위해 반드시 병원에 방문하여 전문의의 진료를 받아보시기를 권장합니다.";

/// The complete system instruction: persona plus the directive that makes the
/// disclaimer mandatory.
pub fn system_instruction() -> String {
    format!("{PERSONA_PREAMBLE} 단, 답변 마지막에는 항상 '{CLOSING_DISCLAIMER}'라는 문구를 포함하세요.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_contains_persona_and_disclaimer() {
        let instruction = system_instruction();
        assert!(instruction.starts_with(PERSONA_PREAMBLE));
        assert!(instruction.contains(CLOSING_DISCLAIMER));
    }

    #[test]
    fn disclaimer_directive_is_mandatory_wording() {
        // "항상" (always) is what makes the provider close every reply with
        // the visit-a-doctor sentence.
        assert!(system_instruction().contains("항상"));
    }
}
