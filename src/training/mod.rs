// Fine-tuning data export
// One chat-format sample per medical record, written as JSON lines


use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::ingest::{self, IngestionError, MedicalRecord};

pub const TRAINING_SYSTEM_PROMPT: &str =
    "你是ClinixBot，一个专业的医疗诊断助手，根据患者的症状提供初步诊断和治疗建议。";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingMessage {
    pub role: String,
    pub content: String,
}

impl TrainingMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub messages: Vec<TrainingMessage>,
}

/// Build the system/user/assistant exchange for one record
#[inline]
pub fn training_sample(record: &MedicalRecord) -> TrainingSample {
    let condition = record.condition();
    let user = format!("患者描述症状: {}相关症状。{}", condition, record.notes());
    let assistant = format!("初步诊断: {}\n建议治疗: {}", condition, record.treatments());

    TrainingSample {
        messages: vec![
            TrainingMessage::new("system", TRAINING_SYSTEM_PROMPT.to_string()),
            TrainingMessage::new("user", user),
            TrainingMessage::new("assistant", assistant),
        ],
    }
}

/// Load the records file and turn every row into a training sample
#[inline]
pub fn prepare_training_data(path: &Path) -> Result<Vec<TrainingSample>, IngestionError> {
    let records = ingest::load_records(path)?;
    Ok(records.iter().map(training_sample).collect())
}

/// Write one JSON object per line
#[inline]
pub fn write_jsonl_to<W: Write>(samples: &[TrainingSample], mut writer: W) -> io::Result<()> {
    for sample in samples {
        serde_json::to_writer(&mut writer, sample)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[inline]
pub fn write_jsonl(samples: &[TrainingSample], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_jsonl_to(samples, BufWriter::new(file))?;
    info!("Wrote {} training samples to {}", samples.len(), path.display());
    Ok(())
}
