use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub matricule: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub parent_phone: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub parent_email: String,
    pub photo: Option<String>,
}

impl Student {
    /// Parent contact line for the absentee call list
    pub fn parent_contact(&self) -> String {
        match (self.parent_name.is_empty(), self.parent_phone.is_empty()) {
            (false, false) => format!("{} ({})", self.parent_name, self.parent_phone),
            (false, true) => self.parent_name.clone(),
            (true, false) => self.parent_phone.clone(),
            (true, true) => "no contact on file".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_student() {
        let json = r#"{"id":"student-1","name":"Alice Johnson","matricule":"CS200/001","field":"Computer Science","level":"Level 200","parentPhone":"+1234567890","parentName":"John Johnson","parentEmail":"john.johnson@email.com","isPresent":null}"#;
        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.matricule, "CS200/001");
        assert_eq!(student.photo, None);
        assert_eq!(student.parent_contact(), "John Johnson (+1234567890)");
    }

    #[test]
    fn test_parent_contact_missing() {
        let json = r#"{"id":"s","name":"Bob"}"#;
        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.parent_contact(), "no contact on file");
    }
}
