//! Feedback languages and their fixed recommendation label tables.

use tracing::warn;

/// A feedback language the critique oracle can be instructed to write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackLanguage {
    pub code: &'static str,
    /// Name used inside the oracle instructions.
    pub name: &'static str,
}

const SUPPORTED_LANGUAGES: &[FeedbackLanguage] = &[
    FeedbackLanguage::ENGLISH,
    FeedbackLanguage { code: "zh", name: "Chinese (中文)" },
    FeedbackLanguage { code: "es", name: "Spanish (Español)" },
    FeedbackLanguage { code: "fr", name: "French (Français)" },
    FeedbackLanguage { code: "de", name: "German (Deutsch)" },
    FeedbackLanguage { code: "ja", name: "Japanese (日本語)" },
    FeedbackLanguage { code: "ko", name: "Korean (한국어)" },
    FeedbackLanguage { code: "pt", name: "Portuguese (Português)" },
    FeedbackLanguage { code: "ru", name: "Russian (Русский)" },
    FeedbackLanguage { code: "it", name: "Italian (Italiano)" },
    FeedbackLanguage { code: "ar", name: "Arabic (العربية)" },
    FeedbackLanguage { code: "hi", name: "Hindi (हिन्दी)" },
    FeedbackLanguage { code: "vi", name: "Vietnamese (Tiếng Việt)" },
    FeedbackLanguage { code: "th", name: "Thai (ไทย)" },
    FeedbackLanguage { code: "id", name: "Indonesian (Bahasa Indonesia)" },
    FeedbackLanguage { code: "nl", name: "Dutch (Nederlands)" },
    FeedbackLanguage { code: "pl", name: "Polish (Polski)" },
    FeedbackLanguage { code: "tr", name: "Turkish (Türkçe)" },
    FeedbackLanguage { code: "sv", name: "Swedish (Svenska)" },
    FeedbackLanguage { code: "no", name: "Norwegian (Norsk)" },
];

impl FeedbackLanguage {
    pub const ENGLISH: FeedbackLanguage = FeedbackLanguage {
        code: "en",
        name: "English",
    };

    pub fn supported() -> &'static [FeedbackLanguage] {
        SUPPORTED_LANGUAGES
    }

    /// Looks up a language code; unsupported codes fall back to English.
    pub fn resolve(code: &str) -> Self {
        let wanted = code.trim().to_ascii_lowercase();
        match SUPPORTED_LANGUAGES.iter().find(|l| l.code == wanted) {
            Some(language) => *language,
            None => {
                warn!(requested = code, "Unsupported feedback language, using English");
                Self::ENGLISH
            }
        }
    }

    pub fn labels(&self) -> &'static RecommendationLabels {
        match self.code {
            "zh" => &CHINESE,
            "es" => &SPANISH,
            "fr" => &FRENCH,
            "ja" => &JAPANESE,
            "ko" => &KOREAN,
            _ => &ENGLISH,
        }
    }
}

/// Fixed label strings for one language. `common_error` carries `{count}` and
/// `{error_type}` placeholders.
#[derive(Debug, PartialEq, Eq)]
pub struct RecommendationLabels {
    pub essay_structure: &'static str,
    pub essay_transitions: &'static str,
    pub essay_coherence: &'static str,
    pub specific_issues: &'static str,
    pub sentence_errors: &'static str,
    pub common_error: &'static str,
    pub excellent: &'static str,
}

impl RecommendationLabels {
    pub fn common_error(&self, count: usize, error_type: &str) -> String {
        self.common_error
            .replace("{count}", &count.to_string())
            .replace("{error_type}", error_type)
    }
}

static ENGLISH: RecommendationLabels = RecommendationLabels {
    essay_structure: "Essay Structure",
    essay_transitions: "Transitions",
    essay_coherence: "Coherence & Flow",
    specific_issues: "Specific Issues to Address",
    sentence_errors: "Sentence-Level Errors",
    common_error: "Found {count} instances of \"{error_type}\"",
    excellent: "Excellent work overall - both sentence quality and essay structure are strong!",
};

static CHINESE: RecommendationLabels = RecommendationLabels {
    essay_structure: "文章结构",
    essay_transitions: "过渡衔接",
    essay_coherence: "连贯性与流畅度",
    specific_issues: "需要注意的具体问题",
    sentence_errors: "句子层面的错误",
    common_error: "发现 {count} 处「{error_type}」",
    excellent: "整体写作优秀 - 句子质量和文章结构都很好！",
};

static SPANISH: RecommendationLabels = RecommendationLabels {
    essay_structure: "Estructura del Ensayo",
    essay_transitions: "Transiciones",
    essay_coherence: "Coherencia y Fluidez",
    specific_issues: "Problemas Específicos a Abordar",
    sentence_errors: "Errores a Nivel de Oración",
    common_error: "Se encontraron {count} casos de \"{error_type}\"",
    excellent: "¡Excelente trabajo en general - tanto la calidad de las oraciones como la estructura del ensayo son sólidas!",
};

static FRENCH: RecommendationLabels = RecommendationLabels {
    essay_structure: "Structure de l'Essai",
    essay_transitions: "Transitions",
    essay_coherence: "Cohérence et Fluidité",
    specific_issues: "Problèmes Spécifiques à Traiter",
    sentence_errors: "Erreurs au Niveau de la Phrase",
    common_error: "{count} instances de \"{error_type}\" trouvées",
    excellent: "Excellent travail dans l'ensemble - la qualité des phrases et la structure de l'essai sont solides!",
};

static JAPANESE: RecommendationLabels = RecommendationLabels {
    essay_structure: "エッセイの構造",
    essay_transitions: "転換",
    essay_coherence: "一貫性と流れ",
    specific_issues: "対処すべき具体的な問題",
    sentence_errors: "文レベルのエラー",
    common_error: "「{error_type}」が{count}箇所見つかりました",
    excellent: "全体的に優れた作品です - 文の品質とエッセイ構造の両方が優れています！",
};

static KOREAN: RecommendationLabels = RecommendationLabels {
    essay_structure: "에세이 구조",
    essay_transitions: "전환",
    essay_coherence: "일관성과 흐름",
    specific_issues: "해결해야 할 구체적인 문제",
    sentence_errors: "문장 수준 오류",
    common_error: "\"{error_type}\"이(가) {count}개 발견되었습니다",
    excellent: "전반적으로 훌륭합니다 - 문장 품질과 에세이 구조 모두 우수합니다!",
};
