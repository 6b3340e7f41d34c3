//! DynamoDB store backend.

use crate::error::StoreError;
use crate::outcome::{GetOutcome, QueryOutcome, UpdateOutcome, WriteOutcome};
use crate::store::KvStore;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeValue, ConsumedCapacity, KeysAndAttributes, PutRequest, ReturnConsumedCapacity,
    WriteRequest,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use workload_types::{Item, ItemKey};

/// Partition key attribute name.
pub const ATTR_PARTITION_KEY: &str = "PK";
/// Sort key attribute name.
pub const ATTR_SORT_KEY: &str = "SK";
/// Payload attribute name.
pub const ATTR_PAYLOAD: &str = "Payload";

/// Error codes DynamoDB answers with when a request is refused for capacity.
///
/// A batch call that cannot process any of its entries fails with one of
/// these instead of listing them as unprocessed.
const THROTTLING_CODES: [&str; 3] = [
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
];

type AttributeMap = HashMap<String, AttributeValue>;

/// DynamoDB connection settings.
#[derive(Debug, Clone)]
pub struct DynamoStoreConfig {
    /// Target table
    pub table_name: String,
    /// AWS region (SDK default when unset)
    pub region: Option<String>,
    /// Endpoint override, e.g. DynamoDB Local
    pub endpoint: Option<String>,
}

impl DynamoStoreConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            region: None,
            endpoint: None,
        }
    }
}

/// Store backed by one DynamoDB table with a `PK` / `SK` composite key.
///
/// Creating a client is relatively expensive, so one `DynamoStore` is shared
/// by every driver in the process.
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoStore {
    /// Create a store from the default AWS configuration chain.
    pub async fn connect(config: DynamoStoreConfig) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::from_sdk_config(&sdk_config, config)
    }

    /// Create a store inheriting an existing `SdkConfig`, then applying overrides.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, config: DynamoStoreConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            table_name: config.table_name,
        }
    }

    /// Create from a pre-built client.
    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn send_batch_write(&self, items: &[Item]) -> Result<WriteOutcome, StoreError> {
        let requests = items
            .iter()
            .map(|item| {
                let put = PutRequest::builder()
                    .set_item(Some(item_to_attributes(item)))
                    .build()
                    .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(self.table_name.clone(), requests)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| classify("BatchWriteItem", e))?;

        let unprocessed = match output
            .unprocessed_items()
            .and_then(|tables| tables.get(&self.table_name))
        {
            Some(requests) => requests
                .iter()
                .filter_map(|request| request.put_request())
                .map(|put| attributes_to_item(put.item()))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(WriteOutcome {
            unprocessed,
            consumed_capacity: total_capacity(output.consumed_capacity()),
        })
    }

    async fn send_batch_get(&self, keys: &[ItemKey]) -> Result<GetOutcome, StoreError> {
        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(key_to_attributes).collect()))
            .build()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;

        let output = self
            .client
            .batch_get_item()
            .request_items(self.table_name.clone(), request)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| classify("BatchGetItem", e))?;

        let items = match output
            .responses()
            .and_then(|tables| tables.get(&self.table_name))
        {
            Some(found) => found
                .iter()
                .map(attributes_to_item)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let unprocessed_keys = match output
            .unprocessed_keys()
            .and_then(|tables| tables.get(&self.table_name))
        {
            Some(pending) => pending
                .keys()
                .iter()
                .map(attributes_to_key)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(GetOutcome {
            items,
            unprocessed_keys,
            consumed_capacity: total_capacity(output.consumed_capacity()),
        })
    }
}

fn item_to_attributes(item: &Item) -> AttributeMap {
    HashMap::from([
        (
            ATTR_PARTITION_KEY.to_string(),
            AttributeValue::S(item.partition_key.clone()),
        ),
        (
            ATTR_SORT_KEY.to_string(),
            AttributeValue::S(item.sort_key.clone()),
        ),
        (
            ATTR_PAYLOAD.to_string(),
            AttributeValue::S(item.payload.clone()),
        ),
    ])
}

fn key_to_attributes(key: &ItemKey) -> AttributeMap {
    HashMap::from([
        (
            ATTR_PARTITION_KEY.to_string(),
            AttributeValue::S(key.partition_key.clone()),
        ),
        (
            ATTR_SORT_KEY.to_string(),
            AttributeValue::S(key.sort_key.clone()),
        ),
    ])
}

fn string_attribute(attributes: &AttributeMap, name: &str) -> Result<String, StoreError> {
    attributes
        .get(name)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .ok_or_else(|| StoreError::MalformedItem(format!("missing string attribute '{name}'")))
}

fn attributes_to_key(attributes: &AttributeMap) -> Result<ItemKey, StoreError> {
    Ok(ItemKey::new(
        string_attribute(attributes, ATTR_PARTITION_KEY)?,
        string_attribute(attributes, ATTR_SORT_KEY)?,
    ))
}

fn attributes_to_item(attributes: &AttributeMap) -> Result<Item, StoreError> {
    let key = attributes_to_key(attributes)?;
    // Payload is optional on read: an item written by something else is still an item
    let payload = attributes
        .get(ATTR_PAYLOAD)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .unwrap_or_default();
    Ok(Item::new(key.partition_key, key.sort_key, payload))
}

fn is_throttling_code(code: Option<&str>) -> bool {
    code.is_some_and(|code| THROTTLING_CODES.contains(&code))
}

/// Classify an SDK failure: capacity refusals become [`StoreError::Throttled`].
fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if is_throttling_code(err.as_service_error().and_then(|service| service.code())) {
        return StoreError::Throttled { operation };
    }
    StoreError::request(operation, DisplayErrorContext(&err).to_string())
}

fn total_capacity(consumed: &[ConsumedCapacity]) -> f64 {
    consumed.iter().filter_map(|c| c.capacity_units()).sum()
}

#[async_trait::async_trait]
impl KvStore for DynamoStore {
    async fn batch_write(&self, items: &[Item]) -> Result<WriteOutcome, StoreError> {
        if items.is_empty() {
            return Ok(WriteOutcome::default());
        }
        WriteOutcome::or_rejected(self.send_batch_write(items).await, items)
    }

    async fn query(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        limit: usize,
    ) -> Result<QueryOutcome, StoreError> {
        // DynamoDB rejects Limit = 0
        if limit == 0 {
            return Ok(QueryOutcome::default());
        }

        let output = self
            .client
            .query()
            .table_name(self.table_name.clone())
            .key_condition_expression(format!(
                "{ATTR_PARTITION_KEY} = :pk AND begins_with({ATTR_SORT_KEY}, :prefix)"
            ))
            .expression_attribute_values(":pk", AttributeValue::S(partition_key.to_string()))
            .expression_attribute_values(":prefix", AttributeValue::S(sort_key_prefix.to_string()))
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| StoreError::request("Query", DisplayErrorContext(&e).to_string()))?;

        let items = output
            .items()
            .iter()
            .map(attributes_to_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryOutcome {
            items,
            consumed_capacity: output
                .consumed_capacity()
                .and_then(|c| c.capacity_units())
                .unwrap_or(0.0),
        })
    }

    async fn batch_get(&self, keys: &[ItemKey]) -> Result<GetOutcome, StoreError> {
        if keys.is_empty() {
            return Ok(GetOutcome::default());
        }
        GetOutcome::or_rejected(self.send_batch_get(keys).await, keys)
    }

    async fn update(&self, key: &ItemKey, payload: &str) -> Result<UpdateOutcome, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(self.table_name.clone())
            .key(
                ATTR_PARTITION_KEY,
                AttributeValue::S(key.partition_key.clone()),
            )
            .key(ATTR_SORT_KEY, AttributeValue::S(key.sort_key.clone()))
            .update_expression("SET #payload = :pl")
            .expression_attribute_names("#payload", ATTR_PAYLOAD)
            .expression_attribute_values(":pl", AttributeValue::S(payload.to_string()))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await;

        match result {
            Ok(output) => Ok(UpdateOutcome::applied(
                output
                    .consumed_capacity()
                    .and_then(|c| c.capacity_units())
                    .unwrap_or(0.0),
            )),
            Err(err) => match classify("UpdateItem", err) {
                StoreError::Throttled { .. } => {
                    tracing::debug!("UpdateItem throttled for {}", key);
                    Ok(UpdateOutcome::throttled())
                }
                other => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_attribute_roundtrip() {
        let item = Item::new("SinglePK#4", "k#abc", "payload");
        let attributes = item_to_attributes(&item);

        assert_eq!(
            attributes.get(ATTR_PARTITION_KEY),
            Some(&AttributeValue::S("SinglePK#4".to_string()))
        );
        assert_eq!(attributes_to_item(&attributes).unwrap(), item);
    }

    #[test]
    fn test_missing_key_attribute_is_malformed() {
        let mut attributes = key_to_attributes(&ItemKey::new("pk", "sk"));
        attributes.remove(ATTR_SORT_KEY);

        let err = attributes_to_key(&attributes).unwrap_err();
        assert!(matches!(err, StoreError::MalformedItem(_)));
    }

    #[test]
    fn test_missing_payload_reads_as_empty() {
        let attributes = key_to_attributes(&ItemKey::new("pk", "sk"));
        let item = attributes_to_item(&attributes).unwrap();
        assert_eq!(item.payload, "");
    }

    #[test]
    fn test_capacity_refusals_are_throttling() {
        assert!(is_throttling_code(Some("ProvisionedThroughputExceededException")));
        assert!(is_throttling_code(Some("ThrottlingException")));
        assert!(is_throttling_code(Some("RequestLimitExceeded")));

        assert!(!is_throttling_code(Some("ResourceNotFoundException")));
        assert!(!is_throttling_code(Some("ValidationException")));
        assert!(!is_throttling_code(None));
    }

    #[test]
    fn test_total_capacity_sums_units() {
        let consumed = vec![
            ConsumedCapacity::builder().capacity_units(12.0).build(),
            ConsumedCapacity::builder().build(),
            ConsumedCapacity::builder().capacity_units(0.5).build(),
        ];
        assert_eq!(total_capacity(&consumed), 12.5);
    }
}
