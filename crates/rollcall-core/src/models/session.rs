use serde::{Deserialize, Serialize};

use super::Student;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub course_title: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub lecturer: String,
    #[serde(default)]
    pub students: Vec<Student>,
}

impl Session {
    /// e.g. "10:00 - 12:00"
    pub fn time_slot(&self) -> String {
        format!("{} - {}", self.start_time, self.end_time)
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_with_students() {
        let json = r#"{"id":"session-1","courseTitle":"Database Systems","courseCode":"CS201","fieldName":"Computer Science","level":"Level 200","room":"Lab 101","startTime":"10:00","endTime":"12:00","day":"Monday","lecturer":"Dr. Smith","students":[{"id":"student-1","name":"Alice Johnson"}]}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.time_slot(), "10:00 - 12:00");
        assert_eq!(session.student("student-1").map(|s| s.name.as_str()), Some("Alice Johnson"));
        assert!(session.student("student-9").is_none());
    }
}
