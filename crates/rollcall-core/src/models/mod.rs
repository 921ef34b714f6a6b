//! Data models for the documents served by the attendance API.
//!
//! This module contains the data structures used to represent:
//!
//! - `Session`: a timetabled class with its enrolled students
//! - `Student`, `Field`: roster and programme data
//! - `DashboardStats`, `FieldStats`, `TopAbsenteeField`: aggregate counters
//! - `AbsenteeRecord`: one row of the absentee report, used to notify parents
//!
//! Wire names are camelCase; unknown fields are ignored.

pub mod dashboard;
pub mod field;
pub mod report;
pub mod session;
pub mod student;

pub use dashboard::{DashboardStats, FieldStats, TopAbsenteeField};
pub use field::Field;
pub use report::{AbsenteeRecord, ReportFilters, ReportType};
pub use session::Session;
pub use student::Student;
