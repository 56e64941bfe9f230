use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueKey(pub String);

impl IssueKey {
    pub fn new(project_key: &str, number: u64) -> Self {
        Self(format!("{}-{number}", project_key.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub key: IssueKey,
    pub summary: String,
    pub issue_type: Option<String>,
    pub reporter: String,
    /// Creation timestamp exactly as the tracker reports it.
    pub created: String,
    pub status: String,
    pub priority: Option<String>,
    pub versions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::IssueKey;

    #[test]
    fn issue_key_upper_cases_project() {
        assert_eq!(IssueKey::new("ds", 1234).as_str(), "DS-1234");
        assert_eq!(IssueKey::new("DS", 7).to_string(), "DS-7");
    }
}
