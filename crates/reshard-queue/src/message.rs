use crate::error::QueueError;
use serde::{Deserialize, Serialize};
use workload_types::{Item, ShardNumber};

/// Tells the redistribution consumer that `items` now live on `shard_number`.
///
/// Wire format: `{"shardNumber": 4, "items": [{"partitionKey", "sortKey", "payload"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedistributionMessage {
    pub shard_number: ShardNumber,
    pub items: Vec<Item>,
}

impl RedistributionMessage {
    pub fn new(shard_number: ShardNumber, items: Vec<Item>) -> Self {
        Self {
            shard_number,
            items,
        }
    }

    pub fn to_body(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_shape() {
        let message = RedistributionMessage::new(
            ShardNumber::new(7),
            vec![Item::new("SinglePK#7", "q#abc", "payload-1")],
        );
        let body: serde_json::Value = serde_json::from_str(&message.to_body().unwrap()).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "shardNumber": 7,
                "items": [
                    {"partitionKey": "SinglePK#7", "sortKey": "q#abc", "payload": "payload-1"}
                ]
            })
        );
    }
}
