use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::session::Relay;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub relay: Relay,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let relay = Relay::new(settings.session.clone());

        Self {
            settings: Arc::new(settings),
            relay,
            start_time: Instant::now(),
        }
    }
}
