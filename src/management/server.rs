//! # 管理服务器
//!
//! Axum HTTP服务器，承载控制面API与内省端点

use axum::Router;
use axum::http::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{MaasError, Result};
use crate::introspect::Introspector;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::reconciler::Reconciler;
use crate::store::Store;
use crate::usage::UsageClient;

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub introspector: Introspector,
    pub reconciler: Arc<Reconciler>,
    pub usage: Option<Arc<UsageClient>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        store: Store,
        reconciler: Arc<Reconciler>,
        usage: Option<Arc<UsageClient>>,
    ) -> Self {
        let introspector = Introspector::new(store.clone());
        Self {
            config,
            store,
            introspector,
            reconciler,
            usage,
        }
    }
}

/// 管理服务器
pub struct ManagementServer {
    port: u16,
    router: Router,
}

impl ManagementServer {
    /// 组装路由与中间件
    #[must_use]
    pub fn new(state: AppState) -> Self {
        let port = state.config.port;
        let debug = state.config.debug;

        let mut router = super::routes::create_routes(state).layer(TraceLayer::new_for_http());

        // 调试模式放开CORS，便于本地前端联调
        if debug {
            router = router.layer(
                CorsLayer::new()
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers(Any)
                    .allow_origin(Any),
            );
        }

        Self { port, router }
    }

    /// 启动并阻塞至收到停机信号
    pub async fn serve(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MaasError::server_start_with_source(format!("监听 {addr} 失败"), e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "listening",
            &format!("Management server listening on {addr}")
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| MaasError::server_start_with_source("HTTP服务异常退出", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "stopped",
            "Management server exited gracefully"
        );
        Ok(())
    }
}

/// SIGINT / SIGTERM 触发优雅停机
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
