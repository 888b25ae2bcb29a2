use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::Router;
use axum_server::Handle;

use crate::error::ApiResult;

pub struct HttpServer {
    addr: SocketAddr,
    handle: Handle,
}

impl HttpServer {
    const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn http(listen_addr: IpAddr, listen_port: u16) -> Self {
        Self {
            addr: SocketAddr::from((listen_addr, listen_port)),
            handle: Handle::new(),
        }
    }

    /// Handle for observing the bound address, or stopping the server.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Ask a running server to stop, giving open connections a short grace
    /// period.
    pub fn signal_stop(handle: &Handle) {
        handle.graceful_shutdown(Some(Self::SHUTDOWN_GRACE));
    }

    /// Serve until [`Self::signal_stop`] is called on its handle.
    pub async fn serve(&self, router: Router) -> ApiResult<()> {
        log::info!("Opening listen port on {}", self.addr);
        axum_server::bind(self.addr)
            .handle(self.handle.clone())
            .serve(router.into_make_service())
            .await?;
        log::info!("Stopped server {}", self.addr);
        Ok(())
    }
}
