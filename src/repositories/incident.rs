use crate::analysis::{Incident, Priority};
use crate::errors::AppError;
use deadpool_postgres::Object;

pub(crate) struct IncidentRepository;

impl IncidentRepository {
    /// Loads every incident whose ID is in `ids`. Unknown IDs are simply
    /// absent from the result; the analysis reports them.
    pub async fn find_by_ids(client: &Object, ids: &[String]) -> Result<Vec<Incident>, AppError> {
        let sql = r#"
            SELECT id::text, priority::text,
                   EXTRACT(EPOCH FROM created_at)::int8,
                   affected_area::text
            FROM incidents
            WHERE id::text = ANY($1)
        "#;

        let rows = client.query(sql, &[&ids]).await?;

        Ok(rows.iter().map(Self::build_incident).collect())
    }

    fn build_incident(row: &tokio_postgres::Row) -> Incident {
        let id: String = row.get(0);
        let raw_priority: String = row.get(1);
        let priority = raw_priority.parse().unwrap_or_else(|err| {
            log::warn!("Incident {id}: {err}, treating as {}", Priority::Medium);
            Priority::Medium
        });

        Incident {
            id,
            priority,
            created_at: row.get(2),
            affected_area: row
                .get::<_, Option<String>>(3)
                .filter(|text| text != "null"),
        }
    }
}
