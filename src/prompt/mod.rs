// Prompt composition
// Fixed diagnosis and medication templates in English and Chinese


use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Response language of the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported language code: {0:?} (expected 'en' or 'zh')")]
pub struct UnknownLanguage(pub String);

impl Language {
    #[inline]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }

    /// Prefix placed in front of the error text when a diagnosis fails
    #[inline]
    pub fn diagnosis_error_prefix(self) -> &'static str {
        match self {
            Self::En => "Error during diagnosis: ",
            Self::Zh => "诊断过程中出现错误: ",
        }
    }

    /// Prefix placed in front of the error text when a recommendation fails
    #[inline]
    pub fn medication_error_prefix(self) -> &'static str {
        match self {
            Self::En => "Error getting medication recommendations: ",
            Self::Zh => "获取药物推荐时出现错误: ",
        }
    }

    #[inline]
    pub fn greeting(self) -> &'static str {
        match self {
            Self::En => {
                "👋 Hello! I'm ClinixBot, your intelligent medical assistant. Please tell me about your symptoms for a preliminary diagnosis."
            }
            Self::Zh => "👋 您好！我是ClinixBot，您的智能医疗助手。请告诉我您的症状，我将为您提供初步诊断。",
        }
    }

    #[inline]
    pub fn disclaimer(self) -> &'static str {
        match self {
            Self::En => {
                "Disclaimer: This system provides preliminary diagnostic references only and cannot replace professional medical diagnosis and treatment advice. For serious symptoms, please seek immediate medical attention."
            }
            Self::Zh => "免责声明：本系统仅提供初步诊断参考，不能替代专业医生的诊断和治疗建议。如有严重症状，请立即就医。",
        }
    }
}

impl fmt::Display for Language {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "zh" => Ok(Self::Zh),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

/// Any CJK unified ideograph marks the text as Chinese
#[inline]
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c)) {
        Language::Zh
    } else {
        Language::En
    }
}

const EN_LABELS: [&str; 5] = [
    "Preliminary Diagnosis",
    "Symptom Analysis",
    "Recommended Tests",
    "Medication Recommendations",
    "Medical Advice",
];

const ZH_LABELS: [&str; 5] = ["初步诊断", "症状分析", "建议检查", "用药建议", "就医建议"];

/// The five answer sections the diagnosis template asks for, in order
#[inline]
pub fn section_labels(language: Language) -> [&'static str; 5] {
    match language {
        Language::En => EN_LABELS,
        Language::Zh => ZH_LABELS,
    }
}

/// Label whose presence in an answer triggers a medication recommendation
#[inline]
pub fn diagnosis_label(language: Language) -> &'static str {
    section_labels(language)[0]
}

/// Build the diagnosis prompt from retrieved passages and the patient's text
#[inline]
pub fn compose(language: Language, context: &[&str], question: &str) -> String {
    let context = context.join("\n\n");
    let [diagnosis, analysis, tests, medication, advice] = section_labels(language);

    match language {
        Language::En => format!(
            "You are ClinixBot, an experienced medical AI assistant. Based on the patient's symptom description and our medical knowledge base, please provide an accurate preliminary diagnosis.

Medical Knowledge Context:
{context}

Patient's Symptom Description: {question}

Please respond in English using the following format:
1. {diagnosis}: [Possible conditions and their probabilities]
2. {analysis}: [Analyze the relationship between described symptoms and conditions]
3. {tests}: [If necessary, suggest medical tests]
4. {medication}: [If applicable, suggest medication treatments]
5. {advice}: [Whether medical attention is needed, and recommended departments]

Important Note: If diagnosis is uncertain or symptoms are severe, always advise the patient to seek immediate medical attention. You are not a doctor, and your suggestions cannot replace professional medical consultation.
"
        ),
        Language::Zh => format!(
            "你是一位经验丰富的医疗AI助手ClinixBot。基于患者的症状描述和我们的医疗知识库，请提供准确的初步诊断。

医疗知识库上下文:
{context}

患者症状描述: {question}

请用中文按照以下格式回答:
1. {diagnosis}：[可能的疾病及其概率]
2. {analysis}：[分析患者描述的症状与疾病的关联]
3. {tests}：[如有必要，建议进行的医学检查]
4. {medication}：[如适用，建议的药物治疗]
5. {advice}：[是否需要就医，以及建议的科室]

重要提示：如果无法确定诊断或症状严重，务必建议患者及时就医。你不是医生，你的建议不能替代专业医疗咨询。
"
        ),
    }
}

/// System and user messages for a medication recommendation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationPrompt {
    pub system: String,
    pub user: String,
}

#[inline]
pub fn compose_medication(language: Language, diagnosis: &str) -> MedicationPrompt {
    match language {
        Language::En => MedicationPrompt {
            system: "You are an experienced pharmacist, focused on providing accurate medication advice to patients. Please answer in English.".to_string(),
            user: format!(
                "Based on the following diagnosis results, recommend suitable over-the-counter medication treatment plans:

{diagnosis}

Please list in English:
1. Recommended Medication Names
2. Dosage and Administration
3. Expected Effects
4. Possible Side Effects
5. Precautions
"
            ),
        },
        Language::Zh => MedicationPrompt {
            system: "你是一位经验丰富的药剂师，专注于为患者提供准确的用药建议。请用中文回答。".to_string(),
            user: format!(
                "基于以下诊断结果，推荐合适的非处方药物治疗方案：

{diagnosis}

请用中文列出:
1. 推荐药物名称
2. 用法用量
3. 预期效果
4. 可能的副作用
5. 注意事项
"
            ),
        },
    }
}
