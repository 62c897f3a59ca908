//! Prompt construction for the critique oracle.

use std::sync::LazyLock;

use regex::Regex;

use super::language::FeedbackLanguage;
use crate::domain::TargetLevel;
use crate::ports::CritiquePrompt;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a professional Chinese language teacher analyzing student writing.

CRITICAL INSTRUCTIONS:
1. Provide ALL feedback in {language}
2. ALL descriptions and suggestions MUST be in {language}
3. The ONLY Chinese text should be in "correction" fields
4. Analyze at TWO levels: sentence-level AND essay-level
5. Be specific, clear, and constructive
6. Respond with a single JSON object and nothing else"#;

/// The fixed half of the user message; only `{language}` is substituted in it.
const ANALYSIS_INSTRUCTIONS: &str = r#"PART 1: SENTENCE-LEVEL ANALYSIS
For EACH sentence, score from 0 to 100:
- grammar_score: word order, particles (的/得/地), measure words, sentence structure
- semantic_score: is the meaning clear and the expression natural?
- collocation_score: are word pairings natural and appropriate?
- overall_quality: your overall judgement of the sentence
List every error (word order, wrong characters, collocation problems, logic issues).

PART 2: ESSAY-LEVEL ANALYSIS
For the ENTIRE essay, score from 0 to 100:
- structure_score: clear beginning, middle and end; ideas well organized
- coherence_score: paragraphs and sentences connect and flow logically
- transition_score: transitions are smooth and transition words (因此, 然而, 首先, 其次) are used well
- topic_consistency_score: the essay stays on one clear main idea
- logic_score: arguments follow from each other without gaps or contradictions
Identify specific issues such as abrupt topic changes, missing transitions, illogical
connections, unclear relationships between paragraphs, jumps in reasoning and contradictions.
Say WHERE each issue occurs.

Return JSON in this EXACT format:
{
  "sentence_analysis": [
    {
      "index": 1,
      "original": "sentence text",
      "grammar_score": 85,
      "semantic_score": 90,
      "collocation_score": 80,
      "overall_quality": 85,
      "issues": [
        {
          "type": "Error type in {language}",
          "description": "Explanation in {language}",
          "correction": "正确的中文",
          "severity": "minor"
        }
      ],
      "improvement_suggestion": "Specific advice in {language}"
    }
  ],
  "essay_analysis": {
    "structure_score": 85,
    "coherence_score": 80,
    "transition_score": 75,
    "topic_consistency_score": 90,
    "logic_score": 85,
    "structure_feedback": "Overall structural assessment in {language}",
    "coherence_feedback": "Flow and connection assessment in {language}",
    "transition_feedback": "Transition quality assessment in {language}",
    "essay_issues": [
      {
        "type": "Issue type in {language}",
        "location": "Between paragraph 1 and 2",
        "description": "Detailed explanation in {language}",
        "suggestion": "How to improve in {language}",
        "severity": "major"
      }
    ],
    "strengths": ["Strength in {language}"],
    "areas_for_improvement": ["Area in {language}"]
  },
  "overall_coherence": 82
}

"severity" must be exactly one of "minor", "major" or "critical".
ALL text in {language} except corrections."#;

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。！？\n]+").expect("valid regex"));

/// Splits text on Chinese sentence-ending punctuation and newlines.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn build_prompt(
    text: &str,
    sentences: &[String],
    paragraphs: &[String],
    level: TargetLevel,
    language: FeedbackLanguage,
) -> CritiquePrompt {
    let numbered_sentences = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    let numbered_paragraphs = paragraphs
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[Paragraph {}]\n{}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n\n");

    // One pass, so braces inside the essay are never read as placeholders.
    let user_payload = format!(
        "Analyze this Chinese essay. Student's target: HSK {level}.\n\n\
         FULL ESSAY:\n{text}\n\n\
         SENTENCES (for sentence-level analysis):\n{numbered_sentences}\n\n\
         PARAGRAPHS (for essay-level analysis):\n{numbered_paragraphs}\n\n\
         {instructions}",
        level = level.get(),
        instructions = ANALYSIS_INSTRUCTIONS.replace("{language}", language.name),
    );

    CritiquePrompt {
        system_instructions: SYSTEM_INSTRUCTIONS.replace("{language}", language.name),
        user_payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::split_paragraphs;

    const ESSAY: &str = "我很喜欢学习中文。中文是一门很有意思的语言。\n\n学习中文有很多好处！你呢？";

    #[test]
    fn sentences_split_on_punctuation_and_newlines() {
        assert_eq!(
            split_sentences(ESSAY),
            vec!["我很喜欢学习中文", "中文是一门很有意思的语言", "学习中文有很多好处", "你呢"]
        );
        assert!(split_sentences("。。\n ！").is_empty());
    }

    #[test]
    fn prompt_enumerates_sentences_and_paragraphs() {
        let prompt = build_prompt(
            ESSAY,
            &split_sentences(ESSAY),
            &split_paragraphs(ESSAY),
            TargetLevel::new(4).unwrap(),
            FeedbackLanguage::resolve("fr"),
        );
        assert!(prompt.system_instructions.contains("French (Français)"));
        assert!(prompt.user_payload.contains("HSK 4"));
        assert!(prompt.user_payload.contains("3. 学习中文有很多好处"));
        assert!(prompt.user_payload.contains("[Paragraph 2]\n学习中文有很多好处！你呢？"));
        assert!(!prompt.user_payload.contains("{language}"));
    }

    #[test]
    fn placeholder_text_inside_the_essay_is_sent_verbatim() {
        let essay = "我写了{paragraphs}这个。今天天气很好。{language}";
        let prompt = build_prompt(
            essay,
            &split_sentences(essay),
            &split_paragraphs(essay),
            TargetLevel::default(),
            FeedbackLanguage::resolve("en"),
        );
        assert_eq!(prompt.user_payload.matches("[Paragraph 1]").count(), 1);
        assert!(prompt.user_payload.contains("1. 我写了{paragraphs}这个\n2. 今天天气很好"));
        assert!(prompt.user_payload.contains("FULL ESSAY:\n我写了{paragraphs}这个。今天天气很好。{language}\n"));
    }

    #[test]
    fn unsupported_language_produces_english_instructions() {
        let prompt = build_prompt(
            ESSAY,
            &split_sentences(ESSAY),
            &split_paragraphs(ESSAY),
            TargetLevel::default(),
            FeedbackLanguage::resolve("klingon"),
        );
        assert!(prompt.system_instructions.contains("Provide ALL feedback in English"));
        assert!(!prompt.user_payload.contains("klingon"));
    }
}
