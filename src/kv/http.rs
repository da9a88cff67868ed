//! Remote store gateway client
//!
//! Every operation is a JSON `POST {endpoint}/v1/{operation}`. Status mapping:
//! - 2xx: success, body is the operation output (an empty body reads as `{}`)
//! - 409: transaction cancelled, body may carry `cancellationReasons`
//! - 412: conditional check failed
//! - anything else: [`KvError::Server`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::*;

/// Store backed by a remote HTTP gateway
pub struct HttpStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyedRequest<'a> {
    table: &'a str,
    key: &'a Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<&'a Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<&'a Condition>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactRequest<'a> {
    items: &'a [TransactItem],
}

#[derive(Deserialize)]
struct ItemResponse {
    #[serde(default)]
    item: Option<Item>,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledResponse {
    #[serde(default)]
    cancellation_reasons: Option<Vec<CancellationReason>>,
}

impl HttpStore {
    /// Create a client for the gateway at `base_url`
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, KvError> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(KvError::InvalidRequest(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/v1/{}", self.base_url, operation)
    }

    async fn call<B, R>(&self, operation: &str, body: &B) -> Result<R, KvError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(self.url(operation)).json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                log::warn!("Store {} timed out", operation);
                KvError::Timeout
            } else {
                KvError::Http(e)
            }
        })?;

        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(KvError::ConditionalCheckFailed),
            StatusCode::CONFLICT => {
                let text = response.text().await.unwrap_or_default();
                // An unparseable body still means cancellation, just without attribution
                let reasons = serde_json::from_str::<CancelledResponse>(&text)
                    .ok()
                    .and_then(|r| r.cancellation_reasons);
                Err(KvError::TransactionCanceled { reasons })
            }
            status if !status.is_success() => Err(KvError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => {
                let bytes = response.bytes().await.map_err(|e| {
                    if e.is_timeout() {
                        KvError::Timeout
                    } else {
                        KvError::Http(e)
                    }
                })?;
                // Gateways may answer writes with 204 and no body
                let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
                    &b"{}"[..]
                } else {
                    &bytes[..]
                };
                Ok(serde_json::from_slice(body)?)
            }
        }
    }
}

#[async_trait]
impl KvStore for HttpStore {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, KvError> {
        let body = KeyedRequest {
            table,
            key,
            item: None,
            condition: None,
        };
        let response: ItemResponse = self.call("getItem", &body).await?;
        Ok(response.item)
    }

    async fn put_item(
        &self,
        table: &str,
        key: &Key,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<(), KvError> {
        let body = KeyedRequest {
            table,
            key,
            item: Some(&item),
            condition: condition.as_ref(),
        };
        let _: Empty = self.call("putItem", &body).await?;
        Ok(())
    }

    async fn update_item(&self, request: UpdateRequest) -> Result<Item, KvError> {
        let response: ItemResponse = self.call("updateItem", &request).await?;
        response
            .item
            .ok_or_else(|| KvError::InvalidItem("updateItem returned no item".to_string()))
    }

    async fn delete_item(
        &self,
        table: &str,
        key: &Key,
        condition: Option<Condition>,
    ) -> Result<(), KvError> {
        let body = KeyedRequest {
            table,
            key,
            item: None,
            condition: condition.as_ref(),
        };
        let _: Empty = self.call("deleteItem", &body).await?;
        Ok(())
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), KvError> {
        let _: Empty = self
            .call("transactWrite", &TransactRequest { items: &items })
            .await?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, KvError> {
        self.call("query", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> HttpStore {
        HttpStore::new(url, Some("secret".to_string()), Duration::from_secs(5), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = HttpStore::new("ftp://example.com", None, Duration::from_secs(1), Duration::from_secs(1));
        assert!(matches!(result, Err(KvError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_get_item_decodes_item() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/getItem")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"item":{"front":{"s":"Q"},"interval":{"n":"6"}}}"#)
            .create_async()
            .await;

        let item = store(&server.url())
            .get_item("cards", &Key::composite("u1", "c1"))
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(item.get("front"), Some(&AttrValue::string("Q")));
        assert_eq!(item.get("interval").and_then(|v| v.as_i64()), Some(6));
    }

    #[tokio::test]
    async fn test_missing_item_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/getItem")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let item = store(&server.url())
            .get_item("cards", &Key::composite("u1", "c1"))
            .await
            .unwrap();
        assert!(item.is_none());
    }

    #[tokio::test]
    async fn test_conflict_carries_cancellation_reasons() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transactWrite")
            .with_status(409)
            .with_body(r#"{"cancellationReasons":[{"code":"conditionalCheckFailed"},{"code":"none"}]}"#)
            .create_async()
            .await;

        let result = store(&server.url()).transact_write(Vec::new()).await;
        match result {
            Err(KvError::TransactionCanceled { reasons: Some(reasons) }) => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons[0].is_conditional_check_failed());
                assert_eq!(reasons[1].code, CancellationCode::None);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conflict_without_reasons() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transactWrite")
            .with_status(409)
            .with_body("not json")
            .create_async()
            .await;

        let result = store(&server.url()).transact_write(Vec::new()).await;
        assert!(matches!(result, Err(KvError::TransactionCanceled { reasons: None })));
    }

    #[tokio::test]
    async fn test_precondition_failed_maps_to_conditional_check() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/deleteItem")
            .with_status(412)
            .create_async()
            .await;

        let result = store(&server.url())
            .delete_item("cards", &Key::composite("u1", "c1"), None)
            .await;
        assert!(matches!(result, Err(KvError::ConditionalCheckFailed)));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/query")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let result = store(&server.url()).query(QueryRequest::new("cards", "u1")).await;
        match result {
            Err(KvError::Server { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "unavailable");
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_success_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/putItem")
            .with_status(204)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/transactWrite")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let store = store(&server.url());
        store
            .put_item("cards", &Key::composite("u1", "c1"), Item::new(), None)
            .await
            .unwrap();
        store.transact_write(Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/getItem")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(1500));
                w.write_all(b"{}")
            })
            .create_async()
            .await;

        let slow = || {
            HttpStore::new(&server.url(), None, Duration::from_millis(200), Duration::from_secs(1)).unwrap()
        };

        let result = slow().get_item("cards", &Key::composite("u1", "c1")).await;
        assert!(matches!(result, Err(KvError::Timeout)), "got {:?}", result);

        let cards = crate::flashcards::CardStore::new(
            std::sync::Arc::new(slow()),
            crate::config::TableNames::default(),
        );
        let result = cards.get("u1", "c1").await;
        assert!(matches!(result, Err(crate::flashcards::CardError::Internal(_))), "got {:?}", result);
    }
}
