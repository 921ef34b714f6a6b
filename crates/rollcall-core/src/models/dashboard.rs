use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_students: u32,
    pub total_fields: u32,
    pub today_absentees: u32,
    pub weekly_absentees: u32,
    pub monthly_absentees: u32,
    pub field_stats: Vec<FieldStats>,
    pub top_absentee_fields: Vec<TopAbsenteeField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldStats {
    pub field_id: String,
    pub field_name: String,
    pub total_students: u32,
    pub present_today: u32,
    pub absent_today: u32,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopAbsenteeField {
    pub field_name: String,
    pub absentee_count: u32,
    pub total_students: u32,
    pub absentee_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_dashboard() {
        let json = r#"{"totalStudents":1250,"todayAbsentees":45,"fieldStats":[{"fieldId":"1","fieldName":"Computer Science","attendanceRate":89.1}]}"#;
        let stats: DashboardStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_students, 1250);
        assert_eq!(stats.weekly_absentees, 0);
        assert_eq!(stats.field_stats[0].field_name, "Computer Science");
        assert!(stats.top_absentee_fields.is_empty());
    }
}
