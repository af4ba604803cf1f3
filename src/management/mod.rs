//! # 管理模块
//!
//! 控制面HTTP表面：路由、身份中间件、处理器与响应约定

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
