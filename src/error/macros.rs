//! # 错误处理宏

/// 快速创建验证错误的宏
#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::error::MaasError::validation($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MaasError::validation(format!($fmt, $($arg)*))
    };
}

/// 快速创建认证错误的宏
#[macro_export]
macro_rules! auth_error {
    ($msg:expr) => {
        $crate::error::MaasError::authentication($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MaasError::authentication(format!($fmt, $($arg)*))
    };
}

/// 快速创建权限错误的宏
#[macro_export]
macro_rules! permission_error {
    ($msg:expr) => {
        $crate::error::MaasError::permission($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MaasError::permission(format!($fmt, $($arg)*))
    };
}

/// 快速创建资源未找到错误的宏
#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $id:expr) => {
        $crate::error::MaasError::not_found($resource, $id)
    };
}

/// 快速创建资源冲突错误的宏
#[macro_export]
macro_rules! conflict_error {
    ($resource:expr, $id:expr) => {
        $crate::error::MaasError::conflict($resource, $id)
    };
}

/// 快速创建数据库错误的宏
#[macro_export]
macro_rules! database_error {
    ($msg:expr) => {
        $crate::error::MaasError::database($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MaasError::database(format!($fmt, $($arg)*))
    };
}

/// 快速创建上游服务错误的宏
#[macro_export]
macro_rules! upstream_error {
    ($msg:expr) => {
        $crate::error::MaasError::upstream($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MaasError::upstream(format!($fmt, $($arg)*))
    };
}

/// 快速创建内部错误的宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::MaasError::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MaasError::internal(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回验证错误
#[macro_export]
macro_rules! ensure_validation {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::validation_error!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::validation_error!($fmt, $($arg)*));
        }
    };
}
