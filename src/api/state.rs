use std::sync::Arc;

use crate::calculate::Board;
use crate::config::{AppConfig, SheetConfig};
use crate::fetch::{SheetLoader, TtlCache};

/// Shared state for every render pass.
#[derive(Clone)]
pub struct AppState {
    pub sheet: Arc<SheetConfig>,
    pub loader: Arc<SheetLoader>,
    /// Prepared boards keyed by sheet fingerprint
    pub boards: Arc<TtlCache<String, Board>>,
    pub min_usage: usize,
    pub show_images: bool,
}

impl AppState {
    pub fn new(config: &AppConfig, loader: SheetLoader) -> Self {
        Self {
            sheet: Arc::new(config.sheet.clone()),
            loader: Arc::new(loader),
            boards: Arc::new(TtlCache::new(config.cache.board_ttl())),
            min_usage: config.leaderboard.min_usage,
            show_images: config.leaderboard.show_images,
        }
    }
}
