use serde::{Deserialize, Serialize};

/// A labeled evaluation case: an anamnesis and the codes that count as correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Protocol identifier the case was built from
    #[serde(rename = "protocol_id")]
    pub id: String,

    /// Free-text symptoms / anamnesis sent to the service
    #[serde(rename = "query")]
    pub query_text: String,

    /// The single code an exact top-1 prediction must equal
    #[serde(rename = "gt")]
    pub ground_truth: String,

    /// Every code that counts as a hit for recall
    #[serde(rename = "icd_codes", default)]
    pub valid_codes: Vec<String>,
}

impl TestCase {
    /// Fill in an empty valid-code list with the ground truth.
    ///
    /// The ground truth must always be a member of the valid set, otherwise an
    /// exact top-1 hit could fail to count toward recall.
    pub fn normalized(mut self) -> Self {
        if !self.valid_codes.iter().any(|c| c == &self.ground_truth) {
            self.valid_codes.push(self.ground_truth.clone());
        }
        self
    }
}
