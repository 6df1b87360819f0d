use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use meatpi_model::store::{load_cook, recent_cooks, recent_readings, save_readings};
use meatpi_model::{CookEntity, ReadingEntity, tables};
use meatpi_table::{
    ContinuationToken, OperationResult, QuerySegment, TableBackend, TableClient, TableEntity,
    TableResult, TableRow, WriteOperation,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

/// Answers every query with one fixed page and records what it was asked.
#[derive(Default)]
struct FixedBackend {
    page: Vec<TableRow>,
    filters: Mutex<Vec<(String, String)>>,
    batches: Mutex<Vec<Vec<WriteOperation>>>,
}

#[async_trait]
impl TableBackend for FixedBackend {
    fn backend_name(&self) -> &'static str {
        "fixed"
    }

    async fn create_table_if_not_exists(&self, _table: &str) -> TableResult<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _table: &str,
        _operation: WriteOperation,
    ) -> TableResult<OperationResult> {
        Ok(OperationResult {
            status: 204,
            etag: None,
        })
    }

    async fn execute_batch(
        &self,
        _table: &str,
        operations: Vec<WriteOperation>,
    ) -> TableResult<Vec<OperationResult>> {
        let results = operations
            .iter()
            .map(|_| OperationResult {
                status: 204,
                etag: Some("W/\"new\"".to_string()),
            })
            .collect();
        self.batches.lock().unwrap().push(operations);
        Ok(results)
    }

    async fn query_segment(
        &self,
        table: &str,
        filter: &str,
        _continuation: Option<&ContinuationToken>,
    ) -> TableResult<QuerySegment> {
        self.filters
            .lock()
            .unwrap()
            .push((table.to_string(), filter.to_string()));
        Ok(QuerySegment {
            rows: self.page.clone(),
            continuation: None,
        })
    }

    async fn retrieve(
        &self,
        _table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<TableRow>> {
        Ok(self
            .page
            .iter()
            .find(|r| r.partition_key == partition_key && r.row_key == row_key)
            .cloned())
    }
}

fn client_over(backend: &Arc<FixedBackend>) -> TableClient {
    TableClient::with_backend(Arc::clone(backend) as Arc<dyn TableBackend>)
}

fn cook_row(cook_id: &str, last_time: &str) -> TableRow {
    let mut cook = CookEntity::new("pi-1", cook_id);
    cook.last_time = last_time.to_string();
    cook.to_row()
}

#[tokio::test]
async fn recent_cooks_are_newest_first() {
    let backend = Arc::new(FixedBackend {
        page: vec![
            cook_row("a", "2024-05-01T10:00:00"),
            cook_row("b", "2024-05-03T10:00:00"),
            cook_row("c", "2024-05-02T10:00:00"),
        ],
        ..Default::default()
    });
    let since = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();

    let cooks = recent_cooks(&client_over(&backend), since).await.unwrap();

    let ids: Vec<&str> = cooks.iter().map(|c| c.cook_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert_eq!(
        backend.filters.lock().unwrap().clone(),
        vec![(
            tables::COOK.to_string(),
            "Timestamp gt datetime'2023-05-01T00:00:00.0000000Z'".to_string()
        )]
    );
}

#[tokio::test]
async fn load_cook_by_key() {
    let backend = Arc::new(FixedBackend {
        page: vec![cook_row("a", "2024-05-01T10:00:00")],
        ..Default::default()
    });
    let client = client_over(&backend);

    let found = load_cook(&client, "pi-1", "a").await.unwrap().unwrap();
    assert_eq!(found.last_time, "2024-05-01T10:00:00");
    assert!(load_cook(&client, "pi-1", "zz").await.unwrap().is_none());
}

#[tokio::test]
async fn recent_readings_cover_two_hours_of_one_cook() {
    let rows = ["t1", "t3", "t2"]
        .iter()
        .map(|t| ReadingEntity::new("pi-1", "cook-7", *t).to_row())
        .collect();
    let backend = Arc::new(FixedBackend {
        page: rows,
        ..Default::default()
    });
    let last = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();

    let readings = recent_readings(&client_over(&backend), "pi-1", "cook-7", last)
        .await
        .unwrap();

    let times: Vec<&str> = readings.iter().map(|r| r.time()).collect();
    assert_eq!(times, vec!["t3", "t2", "t1"]);
    let (table, filter) = backend.filters.lock().unwrap()[0].clone();
    assert_eq!(table, tables::READING);
    assert_eq!(
        filter,
        "(PartitionKey eq 'pi-1|cook-7') and (Timestamp gt datetime'2024-05-01T12:00:00.0000000Z')"
    );
}

#[tokio::test]
async fn save_readings_batches_one_partition() {
    let backend = Arc::new(FixedBackend::default());
    let mut readings: Vec<ReadingEntity> = (0..3)
        .map(|i| ReadingEntity::new("pi-1", "cook-7", format!("t{i}")))
        .collect();

    save_readings(&client_over(&backend), &mut readings).await.unwrap();

    let batches = backend.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].iter().all(|op| op.row.partition_key == "pi-1|cook-7"));
    assert!(readings.iter().all(|r| r.etag.as_deref() == Some("W/\"new\"")));
}

#[tokio::test]
async fn readings_across_cooks_are_rejected() {
    let backend = Arc::new(FixedBackend::default());
    let mut readings = vec![
        ReadingEntity::new("pi-1", "cook-7", "t0"),
        ReadingEntity::new("pi-1", "cook-8", "t0"),
    ];

    let err = save_readings(&client_over(&backend), &mut readings)
        .await
        .unwrap_err();

    assert!(matches!(err, meatpi_model::ModelError::Table(ref e) if e.is_invalid_argument()));
    assert!(backend.batches.lock().unwrap().is_empty());
}
