//! Venue gateway REST client.
//!
//! Both venues are reached through one gateway at `RPC_ADDRESS`, addressed
//! by a venue key path segment:
//! - `GET  /v1/{venue}/markets/{asset}/book` for depth and mark price
//! - `GET  /v1/{venue}/accounts/{account}/positions/{asset}` for exposure
//! - `POST /v1/{venue}/orders` for signed market orders
//! - `GET  /v1/{venue}/accounts` for every account's margin health
//! - `POST /v1/{venue}/liquidations` for signed liquidations
//!
//! The client keeps no market or account state between calls.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::depth::{BookLevel, OrderBook};
use super::error::VenueError;
use super::traits::{AccountDirectory, LiquidationSink, OrderSink, PositionSource, QuoteSource};
use super::types::{
    AccountHealth, Direction, EntryPriceEstimate, LiquidationReceipt, MarketOrder, OrderReceipt,
    OrderSide, Position, PositionDirection, PositionSize, Quote, SizeConvention, Venue,
};
use crate::config::Network;

/// Connection settings for one venue behind the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Path segment selecting the venue (e.g. "drift")
    pub venue_key: String,
    pub network: Network,
    /// Signing credential; never logged
    pub private_key: String,
    pub size_convention: SizeConvention,
    pub timeout: Duration,
}

/// Book response: levels plus the venue's mark price.
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
    #[serde(with = "rust_decimal::serde::str")]
    mark: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionResponse {
    #[serde(with = "rust_decimal::serde::str")]
    size: Decimal,
    side: PositionDirection,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    unrealized_pnl: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    total_fees_paid: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<AccountHealth>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    client_order_id: &'a str,
    asset: &'a str,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: &'static str,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    notional_usd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    reference_price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LiquidationRequest<'a> {
    account_id: &'a str,
}

/// REST client for one venue behind the gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    venue: Venue,
    asset: String,
    config: GatewayConfig,
    account_id: String,
}

impl GatewayClient {
    /// Create a client for `venue` trading `asset`.
    pub fn new(venue: Venue, asset: &str, config: GatewayConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let account_id = Self::derive_account_id(&config.private_key);

        Ok(Self {
            http,
            venue,
            asset: asset.to_string(),
            config,
            account_id,
        })
    }

    /// Stable public account id derived from the signing credential.
    pub fn derive_account_id(private_key: &str) -> String {
        let digest = Sha256::digest(private_key.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.venue_key),
            path
        )
    }

    /// HMAC-SHA256 over `timestamp + body`, hex encoded.
    fn sign(&self, timestamp: &str, body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.private_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// POST a signed JSON body. Every failure is an `OrderRejected`.
    async fn post_signed<B, R>(&self, path: &str, request: &B) -> Result<R, VenueError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(request).map_err(|e| {
            VenueError::rejected(self.venue, format!("failed to encode request: {}", e))
        })?;

        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, &body);

        let response = self
            .http
            .post(self.url(path))
            .header("X-Network", self.config.network.as_str())
            .header("X-Timestamp", &timestamp)
            .header("X-Signature", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| VenueError::rejected(self.venue, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, path, "Gateway refused request");
            return Err(VenueError::rejected(
                self.venue,
                format!("gateway error {}: {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| VenueError::rejected(self.venue, format!("invalid receipt: {}", e)))
    }

    /// Fetch the order book and mark price.
    #[instrument(skip(self), fields(venue = %self.venue))]
    pub async fn get_book(&self) -> Result<(OrderBook, Decimal), VenueError> {
        let url = self.url(&format!("markets/{}/book", urlencoding::encode(&self.asset)));

        let response = self
            .http
            .get(&url)
            .header("X-Network", self.config.network.as_str())
            .send()
            .await
            .map_err(|e| {
                VenueError::market_data(self.venue, format!("book request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::market_data(
                self.venue,
                format!("gateway error {}: {}", status, body),
            ));
        }

        let data: BookResponse = response.json().await.map_err(|e| {
            VenueError::market_data(self.venue, format!("invalid book response: {}", e))
        })?;

        debug!(
            bids = data.bids.len(),
            asks = data.asks.len(),
            mark = %data.mark,
            "Fetched order book"
        );

        Ok((OrderBook::new(data.bids, data.asks), data.mark))
    }
}

#[async_trait]
impl QuoteSource for GatewayClient {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn best_bid_ask(&self) -> Result<Quote, VenueError> {
        let (book, _) = self.get_book().await?;
        book.best_bid_ask(self.venue)
    }

    async fn entry_price(
        &self,
        direction: Direction,
        notional_usd: Decimal,
    ) -> Result<EntryPriceEstimate, VenueError> {
        let (book, mark) = self.get_book().await?;
        book.entry_price(self.venue, direction, notional_usd, mark)
    }
}

#[async_trait]
impl PositionSource for GatewayClient {
    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn position(&self, asset: &str) -> Result<Position, VenueError> {
        let url = self.url(&format!(
            "accounts/{}/positions/{}",
            self.account_id,
            urlencoding::encode(asset)
        ));

        let response = self
            .http
            .get(&url)
            .header("X-Network", self.config.network.as_str())
            .send()
            .await
            .map_err(|e| {
                VenueError::account(self.venue, format!("position request failed: {}", e))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%asset, "No open position");
            return Ok(Position::flat(self.venue, asset));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::account(
                self.venue,
                format!("gateway error {}: {}", status, body),
            ));
        }

        let data: PositionResponse = response.json().await.map_err(|e| {
            VenueError::account(self.venue, format!("invalid position response: {}", e))
        })?;

        let direction = if data.size.is_zero() {
            PositionDirection::Flat
        } else {
            data.side
        };

        Ok(Position {
            venue: self.venue,
            asset: asset.to_string(),
            size: PositionSize::from_convention(self.config.size_convention, data.size),
            direction,
            unrealized_pnl: data.unrealized_pnl.unwrap_or_default(),
            fees_paid: data.total_fees_paid.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl OrderSink for GatewayClient {
    #[instrument(
        skip(self, order),
        fields(venue = %self.venue, client_order_id = %order.client_order_id)
    )]
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt, VenueError> {
        let request = OrderRequest {
            client_order_id: &order.client_order_id,
            asset: &order.asset,
            side: order.side,
            order_type: "market",
            quantity: order.quantity,
            notional_usd: order.notional_usd,
            reference_price: order.reference_price,
        };
        self.post_signed("orders", &request).await
    }
}

#[async_trait]
impl AccountDirectory for GatewayClient {
    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn accounts(&self) -> Result<Vec<AccountHealth>, VenueError> {
        let response = self
            .http
            .get(self.url("accounts"))
            .header("X-Network", self.config.network.as_str())
            .send()
            .await
            .map_err(|e| {
                VenueError::account(self.venue, format!("account list request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::account(
                self.venue,
                format!("gateway error {}: {}", status, body),
            ));
        }

        let data: AccountsResponse = response.json().await.map_err(|e| {
            VenueError::account(self.venue, format!("invalid account list: {}", e))
        })?;

        debug!(accounts = data.accounts.len(), "Fetched account list");
        Ok(data.accounts)
    }
}

#[async_trait]
impl LiquidationSink for GatewayClient {
    #[instrument(skip(self), fields(venue = %self.venue))]
    async fn liquidate(&self, account_id: &str) -> Result<LiquidationReceipt, VenueError> {
        self.post_signed("liquidations", &LiquidationRequest { account_id }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, convention: SizeConvention) -> GatewayClient {
        GatewayClient::new(
            Venue::B,
            "SOL",
            GatewayConfig {
                base_url: server.uri(),
                venue_key: "drift".to_string(),
                network: Network::Devnet,
                private_key: "secret".to_string(),
                size_convention: convention,
                timeout: Duration::from_secs(2),
            },
        )
        .unwrap()
    }

    async fn mount_book(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/drift/markets/SOL/book"))
            .and(header("X-Network", "devnet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bids": [["99.90", "50"], ["99.50", "100"]],
                "asks": [["100.10", "50"], ["100.50", "100"]],
                "mark": "100.00"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_best_bid_ask_from_book() {
        let server = MockServer::start().await;
        mount_book(&server).await;

        let quote = client(&server, SizeConvention::Units).best_bid_ask().await.unwrap();
        assert_eq!(quote.best_bid, dec!(99.90));
        assert_eq!(quote.best_ask, dec!(100.10));
        assert_eq!(quote.venue, Venue::B);
    }

    #[tokio::test]
    async fn test_repeated_quotes_are_equal() {
        let server = MockServer::start().await;
        mount_book(&server).await;

        let client = client(&server, SizeConvention::Units);
        let first = client.best_bid_ask().await.unwrap();
        let second = client.best_bid_ask().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_entry_prices_straddle_mark() {
        let server = MockServer::start().await;
        mount_book(&server).await;

        let client = client(&server, SizeConvention::Units);
        let long = client.entry_price(Direction::Long, dec!(1000)).await.unwrap();
        let short = client.entry_price(Direction::Short, dec!(1000)).await.unwrap();
        assert!(long.price > dec!(100));
        assert!(short.price < dec!(100));
    }

    #[tokio::test]
    async fn test_book_failure_is_market_data_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/drift/markets/SOL/book"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client(&server, SizeConvention::Units).best_bid_ask().await.unwrap_err();
        assert!(matches!(err, VenueError::MarketDataUnavailable { venue: Venue::B, .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_position_uses_size_convention() {
        let server = MockServer::start().await;
        let client = client(&server, SizeConvention::NotionalUsd);
        let url = format!("/v1/drift/accounts/{}/positions/SOL", client.account_id());

        Mock::given(method("GET"))
            .and(path(url.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "size": "2500",
                "side": "short",
                "unrealizedPnl": "-3.5",
                "totalFeesPaid": "1.25"
            })))
            .mount(&server)
            .await;

        let position = client.position("SOL").await.unwrap();
        assert_eq!(position.size, PositionSize::NotionalUsd(dec!(2500)));
        assert_eq!(position.direction, PositionDirection::Short);
        assert_eq!(position.signed_units(dec!(125)), dec!(-20));
        assert_eq!(position.unrealized_pnl, dec!(-3.5));
        assert_eq!(position.fees_paid, dec!(1.25));
    }

    #[tokio::test]
    async fn test_missing_position_is_flat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let position = client(&server, SizeConvention::Units).position("SOL").await.unwrap();
        assert_eq!(position.direction, PositionDirection::Flat);
    }

    #[tokio::test]
    async fn test_uninitialized_account_is_account_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(409).set_body_string("account not initialized"))
            .mount(&server)
            .await;

        let err = client(&server, SizeConvention::Units).position("SOL").await.unwrap_err();
        assert!(matches!(err, VenueError::AccountUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_order_is_signed_and_receipt_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/drift/orders"))
            .and(header_exists("X-Signature"))
            .and(header_exists("X-Timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "orderId": "abc-1",
                "clientOrderId": "7-venue-b",
                "filledQuantity": "10",
                "averagePrice": "100.1",
                "acceptedAt": "2026-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let order = MarketOrder {
            client_order_id: "7-venue-b".to_string(),
            asset: "SOL".to_string(),
            side: OrderSide::Buy,
            notional_usd: dec!(1000),
            reference_price: dec!(100),
            quantity: dec!(10),
        };

        let receipt = client(&server, SizeConvention::Units)
            .submit_market_order(&order)
            .await
            .unwrap();
        assert_eq!(receipt.order_id, "abc-1");
        assert_eq!(receipt.filled_quantity, dec!(10));
    }

    #[tokio::test]
    async fn test_refused_order_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("insufficient collateral"))
            .mount(&server)
            .await;

        let order = MarketOrder {
            client_order_id: "1-venue-b".to_string(),
            asset: "SOL".to_string(),
            side: OrderSide::Sell,
            notional_usd: dec!(1000),
            reference_price: dec!(100),
            quantity: dec!(10),
        };

        let result = client(&server, SizeConvention::Units).submit_market_order(&order).await;
        let err = tokio_test::assert_err!(result);
        assert!(err.to_string().contains("insufficient collateral"));
    }

    #[test]
    fn test_account_id_is_stable() {
        let a = GatewayClient::derive_account_id("secret");
        assert_eq!(a.len(), 16);
        assert_eq!(a, GatewayClient::derive_account_id("secret"));
        assert_ne!(a, GatewayClient::derive_account_id("other"));
    }

    #[tokio::test]
    async fn test_overflowing_book_is_an_error_not_a_panic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/drift/markets/SOL/book"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bids": [["99", "10"]],
                "asks": [["79228162514264337593543950", "100000"]],
                "mark": "100"
            })))
            .mount(&server)
            .await;

        let err = client(&server, SizeConvention::Units)
            .entry_price(Direction::Long, dec!(1000))
            .await
            .unwrap_err();
        assert!(matches!(err, VenueError::MarketDataUnavailable { venue: Venue::B, .. }));
    }

    #[tokio::test]
    async fn test_account_list_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/drift/accounts"))
            .and(header("X-Network", "devnet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accounts": [
                    { "accountId": "acc-1", "authority": "owner-1", "canBeLiquidated": false },
                    { "accountId": "acc-2", "authority": "owner-2", "canBeLiquidated": true }
                ]
            })))
            .mount(&server)
            .await;

        let accounts = client(&server, SizeConvention::Units).accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts[1].can_be_liquidated);
        assert_eq!(accounts[1].authority, "owner-2");
    }

    #[tokio::test]
    async fn test_account_list_failure_is_account_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/drift/accounts"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server, SizeConvention::Units).accounts().await.unwrap_err();
        assert!(matches!(err, VenueError::AccountUnavailable { venue: Venue::B, .. }));
    }

    #[tokio::test]
    async fn test_liquidation_is_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/drift/liquidations"))
            .and(header_exists("X-Signature"))
            .and(header_exists("X-Timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accountId": "acc-2",
                "txId": "5xTx"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client(&server, SizeConvention::Units).liquidate("acc-2").await.unwrap();
        assert_eq!(receipt.tx_id, "5xTx");
        assert_eq!(receipt.account_id, "acc-2");
    }

    #[tokio::test]
    async fn test_refused_liquidation_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/drift/liquidations"))
            .respond_with(ResponseTemplate::new(400).set_body_string("account is healthy"))
            .mount(&server)
            .await;

        let err = client(&server, SizeConvention::Units).liquidate("acc-1").await.unwrap_err();
        assert!(matches!(err, VenueError::OrderRejected { venue: Venue::B, .. }));
        assert!(err.to_string().contains("account is healthy"));
    }
}
