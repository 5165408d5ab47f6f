//! Grid trading engine
//!
//! The engine seeds one limit order per grid level and, whenever an order
//! fills, places the opposite order on the neighbouring level. The exchange
//! is the only source of truth for order state: before every mirrored
//! placement the engine asks whether an order already rests there.

use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::levels::{compute_levels, format_price, initial_side, mirror_index, required_balance, RequiredBalance};
use crate::backpack::messages::OrderUpdateEvent;
use crate::common::errors::Result;
use crate::common::traits::{GridExchange, MessageFormat, Notifier};
use crate::common::types::{GridLevel, OrderRequest, Side};
use crate::config::types::AppConfig;

/// Engine parameters resolved from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub lower_price: Decimal,
    pub upper_price: Decimal,
    pub number_of_grids: u32,
    pub quantity_per_grid: Decimal,
    pub price_decimal: u32,
    pub balance_poll_interval: Duration,
    pub cancel_settle_delay: Duration,
    pub placement_retry_delay: Duration,
    pub fill_max_attempts: u32,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (base_asset, quote_asset) = config.grid.assets()?;
        let settings = &config.settings;
        Ok(Self {
            symbol: config.grid.symbol.clone(),
            base_asset,
            quote_asset,
            lower_price: config.grid.lower_price,
            upper_price: config.grid.upper_price,
            number_of_grids: config.grid.number_of_grids,
            quantity_per_grid: config.grid.quantity_per_grid,
            price_decimal: config.grid.price_decimal,
            balance_poll_interval: Duration::from_millis(settings.balance_poll_interval_ms),
            cancel_settle_delay: Duration::from_millis(settings.cancel_settle_delay_ms),
            placement_retry_delay: Duration::from_millis(settings.placement_retry_delay_ms),
            fill_max_attempts: settings.fill_max_attempts,
        })
    }
}

/// What a fill event led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Not a fill, another market, or outside the mirrored range
    Ignored,
    /// The neighbouring level already holds an order
    MirrorExists { index: u32 },
    /// A mirrored order was placed
    Placed { index: u32, side: Side },
    /// The existence check or every placement attempt failed
    Failed { index: u32 },
}

/// Retry bookkeeping for one level of the initial ladder
#[derive(Debug)]
struct LevelPlacement {
    level: GridLevel,
    side: Side,
    attempts: u32,
}

impl LevelPlacement {
    fn new(level: GridLevel, side: Side) -> Self {
        Self {
            level,
            side,
            attempts: 0,
        }
    }
}

/// Fill-driven grid engine over any [`GridExchange`]
pub struct GridEngine<E: GridExchange> {
    settings: EngineSettings,
    levels: Vec<GridLevel>,
    exchange: Arc<E>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl<E: GridExchange + 'static> GridEngine<E> {
    /// Build the engine and its immutable ladder
    pub fn new(settings: EngineSettings, exchange: Arc<E>) -> Result<Self> {
        let levels = compute_levels(settings.lower_price, settings.upper_price, settings.number_of_grids)?;
        Ok(Self {
            settings,
            levels,
            exchange,
            notifier: None,
        })
    }

    /// Send a chat message after each mirrored placement
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Funds the ladder needs at the current market price
    pub async fn required_balance(&self) -> Result<RequiredBalance> {
        let last_price = self.exchange.last_price(&self.settings.symbol).await?;
        let required = required_balance(&self.levels, last_price, self.settings.quantity_per_grid);
        info!(
            "[{}] Estimated required balance: {} {} and {} {}",
            self.settings.symbol,
            required.base.round_dp(4),
            self.settings.base_asset,
            required.quote.round_dp(2),
            self.settings.quote_asset
        );
        Ok(required)
    }

    /// Bring the ladder up: wait for funds, clear the book, seed every level
    ///
    /// Only failures before any order is placed are returned; placement
    /// problems are retried per level.
    pub async fn start(&self) -> Result<()> {
        let required = self.required_balance().await?;

        info!("[{}] Checking for sufficient balance...", self.settings.symbol);
        self.wait_for_funds(&self.settings.quote_asset, required.quote).await;
        self.wait_for_funds(&self.settings.base_asset, required.base).await;

        self.exchange.cancel_all_orders(&self.settings.symbol).await?;
        tokio::time::sleep(self.settings.cancel_settle_delay).await;

        let reference = self.exchange.last_price(&self.settings.symbol).await?;
        info!("[{}] Reference price {}", self.settings.symbol, reference);

        self.place_initial_ladder(reference).await;
        Ok(())
    }

    /// Poll until `asset` covers `required`; never times out
    pub async fn wait_for_funds(&self, asset: &str, required: Decimal) {
        if required <= Decimal::ZERO {
            return;
        }
        loop {
            if self.has_available(asset, required).await {
                info!("[{}] Sufficient {} balance found", self.settings.symbol, asset);
                return;
            }
            info!(
                "[{}] Insufficient {} balance, waiting {:?}...",
                self.settings.symbol, asset, self.settings.balance_poll_interval
            );
            tokio::time::sleep(self.settings.balance_poll_interval).await;
        }
    }

    /// Whether one order of `quantity` at `price` on `side` is funded
    pub async fn check_balance(&self, side: Side, quantity: Decimal, price: Decimal) -> bool {
        let (asset, required) = match side {
            Side::Bid => (&self.settings.quote_asset, quantity * price),
            Side::Ask => (&self.settings.base_asset, quantity),
        };
        self.has_available(asset, required).await
    }

    async fn has_available(&self, asset: &str, required: Decimal) -> bool {
        let balances = match self.exchange.balances().await {
            Ok(balances) => balances,
            Err(e) => {
                error!("[{}] Failed to check balance: {}", self.settings.symbol, e);
                return false;
            }
        };

        let Some(balance) = balances.get(asset) else {
            error!("[{}] Cannot find {} balance", self.settings.symbol, asset);
            return false;
        };

        if balance.available < required {
            error!(
                "[{}] Insufficient {} balance. Required: {}, Available: {}",
                self.settings.symbol, asset, required, balance.available
            );
            return false;
        }
        true
    }

    /// Place one grid order after re-checking its funding
    ///
    /// Returns `false` on insufficient balance or any exchange error.
    pub async fn place_order(&self, level: GridLevel, side: Side, notify: bool) -> bool {
        let quantity = self.settings.quantity_per_grid;
        if !self.check_balance(side, quantity, level.price).await {
            warn!(
                "[{}] Skipping order due to insufficient balance. Will retry in next update.",
                self.settings.symbol
            );
            return false;
        }

        let price = format_price(level.price, self.settings.price_decimal);
        let request = OrderRequest::limit(level.index, &self.settings.symbol, side, price.clone(), quantity);

        if let Err(e) = self.exchange.execute_order(&request).await {
            error!("[{}] Failed to execute order: {}", self.settings.symbol, e);
            return false;
        }
        info!("[{}] {} {}_{}", self.settings.symbol, side, quantity, price);

        if notify {
            self.notify(&format!(
                "[{}] Grid order executed: {} {}@{}",
                self.settings.symbol, side, quantity, price
            ))
            .await;
        }
        true
    }

    /// Seed every level in index order
    ///
    /// A level that cannot be placed is retried after the placement delay
    /// until it succeeds; later levels wait for it.
    pub async fn place_initial_ladder(&self, reference: Decimal) {
        for level in &self.levels {
            let mut placement = LevelPlacement::new(*level, initial_side(level.price, reference));
            loop {
                placement.attempts += 1;
                if self.place_order(placement.level, placement.side, false).await {
                    break;
                }
                warn!(
                    "[{}] Level {} not placed (attempt {}), retrying in {:?}",
                    self.settings.symbol,
                    placement.level.index,
                    placement.attempts,
                    self.settings.placement_retry_delay
                );
                tokio::time::sleep(self.settings.placement_retry_delay).await;
            }
        }
        info!("[{}] Initial grid of {} levels placed", self.settings.symbol, self.levels.len());
    }

    /// Mirror a fill onto the neighbouring level
    pub async fn handle_fill(&self, event: &OrderUpdateEvent) -> FillOutcome {
        if !event.is_fill() {
            return FillOutcome::Ignored;
        }
        if let Some(symbol) = &event.symbol {
            if symbol != &self.settings.symbol {
                debug!("[{}] Ignoring fill on {}", self.settings.symbol, symbol);
                return FillOutcome::Ignored;
            }
        }

        let (Some(client_id), Some(side)) = (event.client_id, event.side) else {
            return FillOutcome::Ignored;
        };
        let Some(index) = mirror_index(client_id, side, self.settings.number_of_grids) else {
            debug!("[{}] Fill at {} has no level to mirror into", self.settings.symbol, client_id);
            return FillOutcome::Ignored;
        };
        let level = self.levels[index as usize];

        info!(
            "[{}] {} filled at level {} ({}), mirroring to level {}",
            self.settings.symbol,
            side,
            client_id,
            event.price.map(|p| p.to_string()).unwrap_or_default(),
            index
        );

        match self.exchange.query_order(&self.settings.symbol, index).await {
            Ok(Some(_)) => {
                debug!("[{}] Level {} already has an order", self.settings.symbol, index);
                return FillOutcome::MirrorExists { index };
            }
            Ok(None) => {}
            Err(e) => {
                error!("[{}] Error checking existing order: {}", self.settings.symbol, e);
                return FillOutcome::Failed { index };
            }
        }

        let mirror_side = side.opposite();
        for attempt in 1..=self.settings.fill_max_attempts {
            if self.place_order(level, mirror_side, true).await {
                return FillOutcome::Placed {
                    index,
                    side: mirror_side,
                };
            }
            debug!(
                "[{}] Mirror placement attempt {}/{} failed",
                self.settings.symbol, attempt, self.settings.fill_max_attempts
            );
            tokio::time::sleep(self.settings.placement_retry_delay).await;
        }

        error!(
            "[{}] Failed to place order after {} retries",
            self.settings.symbol, self.settings.fill_max_attempts
        );
        FillOutcome::Failed { index }
    }

    /// Consume order-update payloads, handling each fill on its own task
    pub async fn process_fills(self: Arc<Self>, mut updates: mpsc::Receiver<Value>) {
        while let Some(payload) = updates.recv().await {
            let event: OrderUpdateEvent = match serde_json::from_value(payload) {
                Ok(event) => event,
                Err(e) => {
                    error!("[{}] Error processing order update: {}", self.settings.symbol, e);
                    continue;
                }
            };
            if !event.is_fill() {
                continue;
            }

            let engine = self.clone();
            tokio::spawn(async move {
                engine.handle_fill(&event).await;
            });
        }
        warn!("[{}] Order update channel closed", self.settings.symbol);
    }

    async fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(text, MessageFormat::Html).await {
                warn!("[{}] Notification failed: {}", self.settings.symbol, e);
            }
        }
    }
}
