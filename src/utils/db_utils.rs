use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::AppError;

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE <table> SET a = ?, b = ? WHERE <id_column> = ?` from a
/// JSON object. Only keys listed in `allowed` may appear; each value goes
/// through `check` so callers can validate per column.
pub fn build_update_sql<F>(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
    check: F,
) -> Result<SqlUpdate, AppError>
where
    F: Fn(&str, &str) -> Result<(), AppError>,
{
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Payload must be a JSON object".into()))?;

    if obj.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::BadRequest(format!(
            "Field '{unknown}' cannot be updated. Allowed: {}",
            allowed.join(", ")
        )));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (column, value) in obj {
        match value {
            Value::String(s) => {
                check(column, s)?;
                values.push(SqlValue::String(s.clone()));
            }
            Value::Null => values.push(SqlValue::Null),
            _ => {
                return Err(AppError::BadRequest(format!(
                    "Field '{column}' must be a string or null"
                )));
            }
        }
        assignments.push(format!("{column} = ?"));
    }

    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            assignments.join(", "),
            id_column
        ),
        values,
    })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accept(_: &str, _: &str) -> Result<(), AppError> {
        Ok(())
    }

    #[test]
    fn builds_update_for_allowed_columns() {
        let update = build_update_sql(
            "attendance",
            &json!({"location": "HQ", "remarks": null}),
            &["location", "remarks"],
            "id",
            9,
            accept,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE attendance SET location = ?, remarks = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("HQ".into()),
                SqlValue::Null,
                SqlValue::U64(9)
            ]
        );
    }

    #[test]
    fn rejects_columns_outside_allow_list() {
        let err = build_update_sql(
            "attendance",
            &json!({"user_email": "x@y.z"}),
            &["location"],
            "id",
            1,
            accept,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("t", &json!({}), &["a"], "id", 1, accept).is_err());
        assert!(build_update_sql("t", &json!([1]), &["a"], "id", 1, accept).is_err());
        assert!(build_update_sql("t", &json!({"a": 3}), &["a"], "id", 1, accept).is_err());
    }

    #[test]
    fn column_check_can_veto_values() {
        let err = build_update_sql("t", &json!({"a": "bad"}), &["a"], "id", 1, |_, v| {
            if v == "bad" {
                Err(AppError::BadRequest("nope".into()))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
