//! Periodic status report sent through the notifier

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::common::errors::Result;
use crate::common::traits::{GridExchange, MessageFormat, Notifier};
use crate::common::types::Side;

pub struct StatusReporter<E: GridExchange> {
    symbol: String,
    exchange: Arc<E>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
}

impl<E: GridExchange + 'static> StatusReporter<E> {
    pub fn new(symbol: &str, exchange: Arc<E>, notifier: Arc<dyn Notifier>, period: Duration) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange,
            notifier,
            period,
        }
    }

    /// Market price plus resting bid and ask counts
    pub async fn render(&self) -> Result<String> {
        let last_price = self.exchange.last_price(&self.symbol).await?;
        let orders = self.exchange.open_orders(&self.symbol).await?;
        let bids = orders.iter().filter(|o| o.side == Side::Bid).count();
        let asks = orders.len() - bids;
        Ok(format!(
            "<b>[{}] {}</b>\nBid: {} | Ask: {}",
            self.symbol, last_price, bids, asks
        ))
    }

    pub async fn report(&self) -> Result<()> {
        let text = self.render().await?;
        self.notifier.notify(&text, MessageFormat::Html).await
    }

    /// Report every period, first one a full period after start
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("[{}] Status report every {:?}", self.symbol, self.period);
            loop {
                ticker.tick().await;
                if let Err(e) = self.report().await {
                    warn!("[{}] Status report failed: {}", self.symbol, e);
                }
            }
        })
    }
}
