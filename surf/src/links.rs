//! Web console links for search hits.

/// `secret/db/user` becomes `{addr}/ui/vault/secrets/secret/show/db/user`.
/// Addresses without a scheme get `https://`.
pub fn vault_web_url(vault_address: &str, path: &str) -> String {
    if path.is_empty() {
        return vault_address.to_string();
    }

    let scheme = if vault_address.starts_with("http") {
        ""
    } else {
        "https://"
    };
    let ui_base = format!(
        "{}{}/ui/vault/secrets",
        scheme,
        vault_address.trim_end_matches('/')
    );

    match path.trim_start_matches('/').split_once('/') {
        Some((mount, rest)) if !rest.is_empty() => format!("{}/{}/show/{}", ui_base, mount, rest),
        Some((mount, _)) => format!("{}/{}", ui_base, mount),
        None => format!("{}/{}", ui_base, path.trim_start_matches('/')),
    }
}

pub fn consul_web_url(ui_base: &str, key: &str) -> String {
    format!("{}/kv/{}/edit", ui_base.trim_end_matches('/'), key)
}

pub fn s3_web_url(bucket: &str, region: &str, prefix: &str) -> String {
    format!(
        "https://s3.console.aws.amazon.com/s3/object/{}?region={}&prefix={}",
        bucket, region, prefix
    )
}

pub fn dynamodb_web_url(table: &str, region: &str) -> String {
    format!(
        "https://console.aws.amazon.com/dynamodbv2/home?region={}#table?name={}",
        region, table
    )
}

pub fn acm_web_url(region: &str, certificate_id: &str) -> String {
    format!(
        "https://console.aws.amazon.com/acm/home?region={}#/certificates/{}",
        region, certificate_id
    )
}
