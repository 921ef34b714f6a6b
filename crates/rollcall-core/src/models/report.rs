use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Session, Student};

const SCHOOL_NAME: &str = "IME Business and Engineering School";
const NOTICE_SIGNATURE: &str = "IME Discipline Master";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeRecord {
    pub id: String,
    pub student_name: String,
    #[serde(default)]
    pub matricule: String,
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub course_title: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub parent_phone: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub parent_email: String,
    pub date: DateTime<Utc>,
    pub session_id: String,
}

impl AbsenteeRecord {
    /// Build the report row for a student marked absent during a roll call.
    /// The id is `<session>-<student>`, matching the server's report rows.
    pub fn from_roll_call(session: &Session, student: &Student, date: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}-{}", session.id, student.id),
            student_name: student.name.clone(),
            matricule: student.matricule.clone(),
            field_name: student.field.clone(),
            level: student.level.clone(),
            course_title: session.course_title.clone(),
            course_code: session.course_code.clone(),
            parent_phone: student.parent_phone.clone(),
            parent_name: student.parent_name.clone(),
            parent_email: student.parent_email.clone(),
            date,
            session_id: session.id.clone(),
        }
    }

    /// Text sent to the parent of an absent student
    pub fn notification_message(&self, session: &Session) -> String {
        format!(
            "Hello {parent},\n\
             \n\
             Greetings from {school}.\n\
             \n\
             We would like to inform you that your child {student} from {field} was absent \
             from {course} class today at {slot}.\n\
             \n\
             Please ensure regular attendance for better academic performance.\n\
             \n\
             Best regards,\n\
             {signature}",
            parent = self.parent_name,
            school = SCHOOL_NAME,
            student = self.student_name,
            field = self.field_name,
            course = self.course_title,
            slot = session.time_slot(),
            signature = NOTICE_SIGNATURE,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Daily => "daily",
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
        }
    }
}

/// Filters for the absentee report endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFilters {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub report_type: ReportType,
    pub field: Option<String>,
    pub level: Option<String>,
}

impl ReportFilters {
    /// Today's daily report, the default view
    pub fn today() -> Self {
        let today = Utc::now().date_naive();
        Self {
            date_from: today,
            date_to: today,
            report_type: ReportType::Daily,
            field: None,
            level: None,
        }
    }

    /// Query parameters in the order the endpoint documents them.
    /// Empty field/level filters are omitted.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("date_from".to_string(), self.date_from.format("%Y-%m-%d").to_string()),
            ("date_to".to_string(), self.date_to.format("%Y-%m-%d").to_string()),
            ("report_type".to_string(), self.report_type.as_str().to_string()),
        ];
        if let Some(field) = self.field.as_ref().filter(|f| !f.is_empty()) {
            params.push(("field".to_string(), field.clone()));
        }
        if let Some(level) = self.level.as_ref().filter(|l| !l.is_empty()) {
            params.push(("level".to_string(), level.clone()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_to_params() {
        let filters = ReportFilters {
            date_from: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
            report_type: ReportType::Weekly,
            field: Some("Computer Science".to_string()),
            level: Some(String::new()),
        };
        let params = filters.to_params();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], ("date_from".to_string(), "2026-03-02".to_string()));
        assert_eq!(params[2], ("report_type".to_string(), "weekly".to_string()));
        assert_eq!(params[3], ("field".to_string(), "Computer Science".to_string()));
    }

    #[test]
    fn test_notification_message() {
        let json = r#"{"id":"session-1","courseTitle":"Database Systems","startTime":"10:00","endTime":"12:00"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        let student = Student {
            id: "student-2".to_string(),
            name: "Bob Smith".to_string(),
            matricule: "CS200/002".to_string(),
            field: "Computer Science".to_string(),
            level: "Level 200".to_string(),
            parent_phone: "+1234567891".to_string(),
            parent_name: "Mary Smith".to_string(),
            parent_email: String::new(),
            photo: None,
        };
        let record = AbsenteeRecord::from_roll_call(&session, &student, Utc::now());

        assert_eq!(
            record.notification_message(&session),
            "Hello Mary Smith,\n\
             \n\
             Greetings from IME Business and Engineering School.\n\
             \n\
             We would like to inform you that your child Bob Smith from Computer Science was absent \
             from Database Systems class today at 10:00 - 12:00.\n\
             \n\
             Please ensure regular attendance for better academic performance.\n\
             \n\
             Best regards,\n\
             IME Discipline Master"
        );
    }

    #[test]
    fn test_parse_absentee_record() {
        let json = r#"{"id":"1","studentName":"John Doe","matricule":"CS300/001","fieldName":"Computer Science","level":"Level 300","courseTitle":"Database Systems","courseCode":"CS301","parentPhone":"+1234567890","parentName":"Jane Doe","parentEmail":"jane.doe@email.com","date":"2026-03-02T08:15:00.000Z","sessionId":"session-1"}"#;
        let record: AbsenteeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.student_name, "John Doe");
        assert_eq!(record.session_id, "session-1");
    }
}
