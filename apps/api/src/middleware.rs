use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use rolereaper_core::{AppError, TenantId, UserIdentity};

use crate::error::ApiResult;

/// Tenant of the caller, set by the upstream gateway.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
/// Subject of the caller, set by the upstream gateway.
pub const REQUESTED_BY_HEADER: &str = "x-requested-by";
/// Optional display name of the caller.
pub const REQUESTED_BY_NAME_HEADER: &str = "x-requested-by-name";

pub async fn require_identity(mut request: Request, next: Next) -> ApiResult<Response> {
    let identity = identity_from_headers(request.headers())?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity_from_headers(headers: &HeaderMap) -> Result<UserIdentity, AppError> {
    let tenant_id = header_value(headers, TENANT_ID_HEADER)?;
    let tenant_id = TenantId::parse(tenant_id)
        .map_err(|_| AppError::Unauthorized(format!("{TENANT_ID_HEADER} is not a tenant id")))?;
    let subject = header_value(headers, REQUESTED_BY_HEADER)?;
    let display_name = header_value(headers, REQUESTED_BY_NAME_HEADER).unwrap_or(subject);

    Ok(UserIdentity::new(subject, display_name, tenant_id))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("{name} header is required")))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use rolereaper_core::{AppError, TenantId};

    use super::{
        REQUESTED_BY_HEADER, REQUESTED_BY_NAME_HEADER, TENANT_ID_HEADER, identity_from_headers,
    };

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                *name,
                HeaderValue::from_str(value).unwrap_or_else(|_| unreachable!()),
            );
        }
        headers
    }

    #[test]
    fn identity_is_read_from_gateway_headers() {
        let tenant_id = TenantId::new();
        let tenant = tenant_id.to_string();

        let identity = identity_from_headers(&headers(&[
            (TENANT_ID_HEADER, tenant.as_str()),
            (REQUESTED_BY_HEADER, " alice@example.com "),
        ]))
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(identity.tenant_id(), tenant_id);
        assert_eq!(identity.subject(), "alice@example.com");
        assert_eq!(identity.display_name(), "alice@example.com");
    }

    #[test]
    fn display_name_header_is_optional() {
        let tenant = TenantId::new().to_string();

        let identity = identity_from_headers(&headers(&[
            (TENANT_ID_HEADER, tenant.as_str()),
            (REQUESTED_BY_HEADER, "alice"),
            (REQUESTED_BY_NAME_HEADER, "Alice Liddell"),
        ]));

        assert!(identity.is_ok_and(|identity| identity.display_name() == "Alice Liddell"));
    }

    #[test]
    fn missing_or_malformed_headers_are_unauthorized() {
        let tenant = TenantId::new().to_string();

        let missing_subject =
            identity_from_headers(&headers(&[(TENANT_ID_HEADER, tenant.as_str())]));
        let blank_subject = identity_from_headers(&headers(&[
            (TENANT_ID_HEADER, tenant.as_str()),
            (REQUESTED_BY_HEADER, "   "),
        ]));
        let bad_tenant = identity_from_headers(&headers(&[
            (TENANT_ID_HEADER, "contoso"),
            (REQUESTED_BY_HEADER, "alice"),
        ]));

        assert!(matches!(missing_subject, Err(AppError::Unauthorized(_))));
        assert!(matches!(blank_subject, Err(AppError::Unauthorized(_))));
        assert!(matches!(bad_tenant, Err(AppError::Unauthorized(_))));
    }
}
