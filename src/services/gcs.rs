use crate::{client::ServiceClient, usage_error};
use anyhow::Context as _;
use serde_json::Value;

/// Pulls the manager URL out of a Transfer endpoint document, requiring the
/// endpoint to be a Globus Connect Server v5 endpoint
pub fn manager_url_from(endpoint_doc: &Value, endpoint_id: &uuid::Uuid) -> anyhow::Result<String> {
    let entity_type = endpoint_doc
        .get("entity_type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");

    if entity_type != "GCSv5_endpoint" {
        usage_error!(
            "Expected {endpoint_id} to be a Globus Connect Server v5 Endpoint.\n\
             Instead, found it was of type '{entity_type}'."
        );
    }

    endpoint_doc
        .get("gcs_manager_url")
        .and_then(|u| u.as_str())
        .map(String::from)
        .with_context(|| format!("endpoint {endpoint_id} does not advertise a GCS manager URL"))
}

/// Looks up the GCS manager URL of an endpoint through Transfer
pub async fn manager_url(transfer: &ServiceClient, endpoint_id: &uuid::Uuid) -> anyhow::Result<String> {
    let doc = transfer.get(&format!("endpoint/{endpoint_id}"), &[]).await?;
    manager_url_from(&doc, endpoint_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: uuid::Uuid = uuid::uuid!("4f9a9e1c-35a5-4a4f-a35c-4d1b8ec6e9f1");

    #[test]
    fn gcsv5_endpoint() {
        let doc = json!({
            "entity_type": "GCSv5_endpoint",
            "gcs_manager_url": "https://abc.123.data.globus.org"
        });
        assert_eq!(
            manager_url_from(&doc, &ID).unwrap(),
            "https://abc.123.data.globus.org"
        );
    }

    #[test]
    fn other_entity_types() {
        let doc = json!({"entity_type": "GCP_mapped_collection"});
        let err = manager_url_from(&doc, &ID).unwrap_err();
        assert!(err.downcast_ref::<crate::error::UsageError>().is_some());
        assert_eq!(
            err.to_string(),
            format!(
                "Expected {ID} to be a Globus Connect Server v5 Endpoint.\n\
                 Instead, found it was of type 'GCP_mapped_collection'."
            )
        );
    }
}
