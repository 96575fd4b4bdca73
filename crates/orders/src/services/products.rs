//! Product lookups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use domain::Money;
use reqwest::{Client, Url};
use resilience::BreakerRegistry;
use serde::{Deserialize, Deserializer, Serialize};

use super::http::{get_json, parse_base_url, resource_url};
use super::{LookupResult, TransportError};

/// Breaker name guarding the products service.
pub const PRODUCTS_SERVICE: &str = "products-service";

/// A product as reported by the products service.
///
/// `price` is authoritative for new orders. The service reports it as a
/// decimal number of major units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(with = "domain::money::major_units")]
    pub price: Money,
    /// Units available. Negative reports read as zero.
    #[serde(deserialize_with = "clamped_stock")]
    pub stock: u32,
}

fn clamped_stock<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let stock = i64::deserialize(deserializer)?;
    Ok(u32::try_from(stock.max(0)).unwrap_or(u32::MAX))
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }
}

/// Transport to the products service.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches a product. `Ok(None)` means the product does not exist.
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, TransportError>;
}

/// Breaker-guarded products client.
#[derive(Clone)]
pub struct ProductsClient {
    catalog: Arc<dyn ProductCatalog>,
    breakers: Arc<BreakerRegistry>,
}

impl ProductsClient {
    pub fn new(catalog: Arc<dyn ProductCatalog>, breakers: Arc<BreakerRegistry>) -> Self {
        Self { catalog, breakers }
    }

    /// Looks up a product through the `products-service` breaker.
    pub async fn find_product(&self, id: &ProductId) -> LookupResult<Product> {
        let catalog = self.catalog.clone();
        let id = id.clone();

        let result = self
            .breakers
            .invoke(PRODUCTS_SERVICE, move || async move {
                catalog.find_product(&id).await
            })
            .await;

        LookupResult::from_call(result)
    }
}

/// Products service over HTTP: `GET {base}/products/{id}`.
#[derive(Debug, Clone)]
pub struct HttpProductCatalog {
    client: Client,
    base_url: Url,
}

impl HttpProductCatalog {
    pub fn new(client: Client, base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, TransportError> {
        let url = resource_url(&self.base_url, "products", id.as_str())?;
        get_json(&self.client, url).await
    }
}

#[derive(Debug, Default)]
struct InMemoryProductState {
    products: HashMap<ProductId, Product>,
    failing: Vec<ProductId>,
    fail_all: bool,
    latency: Option<Duration>,
    calls: usize,
}

/// In-memory products service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<Mutex<InMemoryProductState>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryProductState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or replaces a product.
    pub fn insert(&self, product: Product) {
        self.lock().products.insert(product.id.clone(), product);
    }

    /// Changes the price of an existing product.
    pub fn set_price(&self, id: &ProductId, price: Money) {
        if let Some(product) = self.lock().products.get_mut(id) {
            product.price = price;
        }
    }

    /// Changes the stock of an existing product.
    pub fn set_stock(&self, id: &ProductId, stock: u32) {
        if let Some(product) = self.lock().products.get_mut(id) {
            product.stock = stock;
        }
    }

    /// Makes every lookup fail with a transport error.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Makes lookups of one product fail with a transport error.
    pub fn fail_product(&self, id: impl Into<ProductId>) {
        self.lock().failing.push(id.into());
    }

    /// Delays every lookup.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Returns how many lookups reached this service.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, TransportError> {
        let latency = {
            let mut state = self.lock();
            state.calls += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.lock();
        if state.fail_all || state.failing.contains(id) {
            return Err(TransportError::Unreachable);
        }
        Ok(state.products.get(id).cloned())
    }
}
