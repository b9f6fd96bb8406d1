pub mod access_token;
pub mod activity;
pub mod address;
pub mod cart;
pub mod commodity;
pub mod health;
pub mod operator;
pub mod order;
pub mod user;

use sqlx::PgPool;

use crate::{
    database::StoreError,
    error::{AppError, AppResult},
    utils::{Claims, Role},
};

/// 顾客接口使用的用户编号，运营令牌不能访问
pub fn customer_id(claims: &Claims) -> AppResult<i64> {
    match claims.role {
        Role::Operator => Err(AppError::Forbidden("该接口仅限顾客使用".into())),
        Role::Customer => claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("令牌无效".into())),
    }
}

pub async fn commodity_exists(pool: &PgPool, commodity_id: &str) -> Result<bool, StoreError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM commodity_data WHERE commodity_id = $1)")
            .bind(commodity_id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TokenKind;

    fn claims(sub: &str, role: Role) -> Claims {
        Claims {
            sub: sub.to_string(),
            iat: 0,
            nbf: 0,
            exp: 0,
            typ: TokenKind::Access,
            role,
        }
    }

    #[test]
    fn customer_id_from_claims() {
        assert_eq!(customer_id(&claims("42", Role::Customer)).unwrap(), 42);
        assert!(matches!(
            customer_id(&claims("100001", Role::Operator)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            customer_id(&claims("abc", Role::Customer)),
            Err(AppError::Unauthorized(_))
        ));
    }
}
