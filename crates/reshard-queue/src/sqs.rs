use crate::error::QueueError;
use crate::sender::QueueSender;
use aws_config::BehaviorVersion;

/// Sends redistribution messages to an SQS queue.
#[derive(Clone, Debug)]
pub struct SqsSender {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsSender {
    /// Create a sender from the default AWS configuration chain.
    pub async fn connect(queue_url: impl Into<String>) -> Self {
        let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(aws_sdk_sqs::Client::new(&aws_config), queue_url)
    }

    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl QueueSender for SqsSender {
    async fn send(&self, body: String) -> Result<(), QueueError> {
        self.client
            .send_message()
            .queue_url(self.queue_url.clone())
            .message_body(body)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| QueueError::Send {
                queue: self.queue_url.clone(),
                message: aws_sdk_sqs::error::DisplayErrorContext(&error).to_string(),
            })
    }

    fn destination(&self) -> &str {
        &self.queue_url
    }
}
