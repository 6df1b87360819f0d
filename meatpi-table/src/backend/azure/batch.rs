//! Entity-group transactions (`$batch`).
//!
//! A batch is a `multipart/mixed` request holding one change set; each part
//! of the change set is a complete HTTP request for one entity. The response
//! mirrors that layout, one embedded HTTP response per operation, or a single
//! error response naming the failing operation.

use super::payload::row_to_json;
use super::{entity_path, error_from_body};
use crate::backend::{OperationResult, WriteKind, WriteOperation};
use crate::entity::WILDCARD_ETAG;
use crate::error::{TableError, TableResult};

/// A rendered batch request body.
pub(crate) struct BatchBody {
    pub content_type: String,
    pub body: String,
}

/// Renders the multipart body for `operations` against `table`.
pub(crate) fn build_batch_body(
    endpoint: &str,
    table: &str,
    operations: &[WriteOperation],
    batch_id: &str,
    changeset_id: &str,
) -> BatchBody {
    let batch_boundary = format!("batch_{batch_id}");
    let changeset_boundary = format!("changeset_{changeset_id}");
    let mut body = String::new();

    body.push_str(&format!(
        "--{batch_boundary}\r\nContent-Type: multipart/mixed; boundary={changeset_boundary}\r\n\r\n"
    ));

    for (index, op) in operations.iter().enumerate() {
        let (method, url) = match op.kind {
            WriteKind::Insert => ("POST", format!("{endpoint}/{table}")),
            kind => {
                let method = match kind {
                    WriteKind::Merge | WriteKind::InsertOrMerge => "MERGE",
                    WriteKind::Replace | WriteKind::InsertOrReplace => "PUT",
                    _ => "DELETE",
                };
                let path = entity_path(table, &op.row.partition_key, &op.row.row_key);
                (method, format!("{endpoint}/{path}"))
            }
        };

        body.push_str(&format!(
            "--{changeset_boundary}\r\n\
             Content-Type: application/http\r\n\
             Content-Transfer-Encoding: binary\r\n\r\n\
             {method} {url} HTTP/1.1\r\n\
             Content-ID: {}\r\n\
             Accept: application/json;odata=minimalmetadata\r\n\
             Prefer: return-no-content\r\n\
             DataServiceVersion: 3.0;\r\n",
            index + 1
        ));
        if op.kind.uses_if_match() {
            let etag = op.row.etag.as_deref().unwrap_or(WILDCARD_ETAG);
            body.push_str(&format!("If-Match: {etag}\r\n"));
        }
        if op.kind.has_body() {
            let payload = row_to_json(&op.row).to_string();
            body.push_str(&format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{payload}\r\n",
                payload.len()
            ));
        } else {
            body.push_str("\r\n");
        }
    }

    body.push_str(&format!("--{changeset_boundary}--\r\n--{batch_boundary}--\r\n"));

    BatchBody {
        content_type: format!("multipart/mixed; boundary={batch_boundary}"),
        body,
    }
}

/// Extracts one result per operation from a `$batch` response body.
///
/// Any embedded non-2xx response fails the whole batch with that status.
pub(crate) fn parse_batch_response(
    body: &str,
    expected: usize,
) -> TableResult<Vec<OperationResult>> {
    let mut results = Vec::with_capacity(expected);
    let mut lines = body.lines().map(|l| l.trim_end_matches('\r'));

    while let Some(line) = lines.next() {
        let Some(status_line) = line.strip_prefix("HTTP/1.1 ") else {
            continue;
        };
        let status: u16 = status_line
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TableError::InvalidData(format!("bad batch status line: {line}")))?;

        let mut etag = None;
        for header in lines.by_ref() {
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.trim().eq_ignore_ascii_case("etag") {
                    etag = Some(value.trim().to_string());
                }
            }
        }

        if !(200..300).contains(&status) {
            let error_body: Vec<&str> = lines
                .by_ref()
                .take_while(|l| !l.starts_with("--"))
                .collect();
            return Err(error_from_body(status, None, &error_body.join("\n")));
        }

        results.push(OperationResult { status, etag });
    }

    if results.len() != expected {
        return Err(TableError::InvalidData(format!(
            "batch response held {} results for {} operations",
            results.len(),
            expected
        )));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TableRow;

    fn op(kind: WriteKind, rk: &str) -> WriteOperation {
        let mut row = TableRow::new("dev1|cook1", rk).with("ChamberTarget", 225.0);
        row.etag = Some("*".into());
        WriteOperation::new(kind, row)
    }

    #[test]
    fn body_has_one_part_per_operation() {
        let ops = vec![op(WriteKind::Insert, "a"), op(WriteKind::Delete, "b")];
        let batch = build_batch_body(
            "https://acct.table.core.windows.net",
            "Reading",
            &ops,
            "B",
            "C",
        );

        assert_eq!(batch.content_type, "multipart/mixed; boundary=batch_B");
        assert_eq!(batch.body.matches("--changeset_C\r\n").count(), 2);
        assert!(batch.body.contains("POST https://acct.table.core.windows.net/Reading HTTP/1.1"));
        assert!(batch.body.contains(
            "DELETE https://acct.table.core.windows.net/Reading(PartitionKey='dev1%7Ccook1',RowKey='b') HTTP/1.1"
        ));
        assert!(batch.body.contains("If-Match: *"));
        assert!(batch.body.ends_with("--changeset_C--\r\n--batch_B--\r\n"));
    }

    #[test]
    fn insert_or_merge_is_unconditional_merge() {
        let ops = [op(WriteKind::InsertOrMerge, "a")];
        let batch = build_batch_body("http://h", "T", &ops, "B", "C");
        assert!(batch.body.contains("MERGE http://h/T(PartitionKey="));
        assert!(!batch.body.contains("If-Match"));
    }

    #[test]
    fn body_opens_changeset_and_sizes_payload() {
        let ops = [op(WriteKind::Replace, "a")];
        let batch = build_batch_body("http://h", "T", &ops, "B", "C");
        let payload = row_to_json(&ops[0].row).to_string();

        assert!(batch.body.starts_with(
            "--batch_B\r\nContent-Type: multipart/mixed; boundary=changeset_C\r\n\r\n--changeset_C\r\n"
        ));
        assert!(batch.body.contains(&format!(
            "Content-Length: {}\r\n\r\n{payload}\r\n--changeset_C--",
            payload.len()
        )));
    }

    #[test]
    fn parses_successful_response() {
        let body = "--batchresponse_1\r\n\
            Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\r\n\
            --changesetresponse_2\r\n\
            Content-Type: application/http\r\n\r\n\
            HTTP/1.1 204 No Content\r\n\
            ETag: W/\"1\"\r\n\r\n\
            --changesetresponse_2\r\n\
            Content-Type: application/http\r\n\r\n\
            HTTP/1.1 204 No Content\r\n\
            ETag: W/\"2\"\r\n\r\n\
            --changesetresponse_2--\r\n\
            --batchresponse_1--\r\n";
        let results = parse_batch_response(body, 2).unwrap();
        assert_eq!(results[0].etag.as_deref(), Some("W/\"1\""));
        assert_eq!(results[1].status, 204);
    }

    #[test]
    fn embedded_error_fails_batch() {
        let body = "--batchresponse_1\r\n\
            Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\r\n\
            --changesetresponse_2\r\n\
            Content-Type: application/http\r\n\r\n\
            HTTP/1.1 409 Conflict\r\n\
            Content-Type: application/json\r\n\r\n\
            {\"odata.error\":{\"code\":\"EntityAlreadyExists\",\"message\":{\"lang\":\"en-US\",\"value\":\"1:The specified entity already exists.\"}}}\r\n\
            --changesetresponse_2--\r\n\
            --batchresponse_1--\r\n";
        let err = parse_batch_response(body, 2).unwrap_err();
        assert!(err.is_conflict());
        match err {
            TableError::Backend { code, .. } => {
                assert_eq!(code.as_deref(), Some("EntityAlreadyExists"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_response_is_invalid() {
        let body = "HTTP/1.1 204 No Content\r\n\r\n";
        assert!(matches!(
            parse_batch_response(body, 2),
            Err(TableError::InvalidData(_))
        ));
    }
}
