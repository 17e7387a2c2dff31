use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{error, info};

use super::routes::{self, ApiContext};
use crate::error_handling::types::WebError;
use crate::session_management::{Dispatcher, SessionManager};

/// Web server for the pages and the JSON API
pub struct WebServer {
    context: Arc<ApiContext>,
}

impl WebServer {
    pub fn new(manager: Arc<SessionManager>, dispatcher: Dispatcher, public_url: String) -> Self {
        Self {
            context: Arc::new(ApiContext {
                manager,
                dispatcher,
                public_url,
            }),
        }
    }

    /// Serves until the process stops.
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<(), WebError> {
        let addr = socket_addr(bind_address, port)?;
        info!("Web interface listening on http://{}", addr);
        warp::serve(routes::routes(self.context.clone()))
            .run(addr)
            .await;
        Ok(())
    }
}

pub fn socket_addr(bind_address: &str, port: u16) -> Result<SocketAddr, WebError> {
    let ip: IpAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address {}: {}", bind_address, e);
        WebError::InvalidAddress(format!("{}: {}", bind_address, e))
    })?;
    Ok(SocketAddr::new(ip, port))
}
