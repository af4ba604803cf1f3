//! # API密钥签发与校验
//!
//! 明文只在签发时产生并返回一次，此后仅以 (prefix, hash_alg, hash, salt)
//! 形式存在。校验逻辑按 `hash_alg` 分派，便于后续切换到内存困难KDF
//! 而无需改动内省端。

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// 明文前缀长度（数据库快速索引）
pub const KEY_PREFIX_LEN: usize = 8;

/// 当前签发使用的哈希算法
pub const HASH_ALG_PLAINTEXT: &str = "plaintext";
/// 预留的内存困难KDF算法名
pub const HASH_ALG_ARGON2ID: &str = "argon2id";

/// 密钥归属：用户密钥或团队服务密钥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOwner {
    /// 归属具体用户
    User(Uuid),
    /// 团队服务密钥，内省时要求 run_as
    TeamService,
}

impl KeyOwner {
    /// 转成可入库的可空用户id
    #[must_use]
    pub const fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::TeamService => None,
        }
    }
}

/// 一次签发产生的全部密钥材料
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    /// 43字符URL-safe base64明文，仅此一次可见
    pub plaintext: String,
    /// 明文前8字符
    pub prefix: String,
    /// 按 `hash_alg` 计算的哈希表示
    pub hash: String,
    pub hash_alg: String,
    /// 16字节随机盐，hex编码
    pub salt: String,
}

/// 生成一把新密钥的全部材料
#[must_use]
pub fn mint() -> KeyMaterial {
    let mut key_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut key_bytes);
    let plaintext = URL_SAFE_NO_PAD.encode(key_bytes);

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);

    let prefix = plaintext[..KEY_PREFIX_LEN].to_string();
    // 目前哈希列存明文以保持校验契约；生产部署须升级为 argon2id
    let hash = plaintext.clone();

    KeyMaterial {
        plaintext,
        prefix,
        hash,
        hash_alg: HASH_ALG_PLAINTEXT.to_string(),
        salt,
    }
}

/// 校验完整令牌与存储的哈希材料是否匹配
///
/// 未知算法一律拒绝；比较为常量时间。
#[must_use]
pub fn verify(token: &str, hash_alg: &str, stored_hash: &str, _salt: &str) -> bool {
    match hash_alg {
        HASH_ALG_PLAINTEXT => {
            let token = token.as_bytes();
            let stored = stored_hash.as_bytes();
            if token.len() != stored.len() {
                return false;
            }
            token.ct_eq(stored).into()
        }
        HASH_ALG_ARGON2ID => {
            let Ok(parsed) = PasswordHash::new(stored_hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(token.as_bytes(), &parsed)
                .is_ok()
        }
        _ => false,
    }
}
