//! The employee record read back from the server.

use std::fmt;

use chrono::NaiveDateTime;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    /// i64 so values beyond the column's 32-bit range are representable
    /// in the program even though the column rejects them.
    pub id: i64,
    pub name: String,
    pub start_dt: NaiveDateTime,
    pub is_remote: bool,
}

impl FromRow<'_, PgRow> for Employee {
    fn from_row(row: &PgRow) -> std::result::Result<Self, sqlx::Error> {
        // The column is INT; widen after decode.
        let id: i32 = row.try_get("id")?;
        Ok(Self {
            id: i64::from(id),
            name: row.try_get("name")?,
            start_dt: row.try_get("start_dt")?,
            is_remote: row.try_get("is_remote")?,
        })
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {} Name: {} Start Datetime: {} Is Remote: {}",
            self.id, self.name, self.start_dt, self.is_remote
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_display_format() {
        let employee = Employee {
            id: 1,
            name: "John Doe".to_string(),
            start_dt: NaiveDate::from_ymd_opt(2022, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            is_remote: true,
        };

        assert_eq!(
            employee.to_string(),
            "ID: 1 Name: John Doe Start Datetime: 2022-01-01 09:00:00 Is Remote: true"
        );
    }
}
