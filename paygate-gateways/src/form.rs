//! Browser hand-off pages for providers that take the payer to their site.

use paygate_types::{HttpMethod, PayError, PayResponse, Params};

/// Auto-submitting form (POST) or a redirect URL (GET) carrying the payload.
pub fn build_pay_html(
    endpoint: &str,
    payload: &Params,
    method: HttpMethod,
) -> Result<PayResponse, PayError> {
    if method == HttpMethod::Get {
        let query = serde_urlencoded::to_string(payload)
            .map_err(|e| PayError::InvalidArgument(e.to_string()))?;
        let sep = if endpoint.contains('?') { '&' } else { '?' };
        return Ok(PayResponse::Redirect(format!("{}{}{}", endpoint, sep, query)));
    }

    let mut html = format!(
        "<form id='alipay_submit' name='alipay_submit' action='{}' method='POST'>",
        endpoint
    );
    for (key, value) in payload.iter() {
        html.push_str(&format!(
            "<input type='hidden' name='{}' value='{}'/>",
            key,
            value.replace('\'', "&apos;")
        ));
    }
    html.push_str("<input type='submit' value='ok' style='display:none;'></form>");
    html.push_str("<script>document.forms['alipay_submit'].submit();</script>");

    Ok(PayResponse::Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_builds_auto_submit_form() {
        let payload = Params::new().with("amount", "1.00").with("name", "it's");
        let PayResponse::Html(html) =
            build_pay_html("http://pay.example/go", &payload, HttpMethod::Post).unwrap()
        else {
            panic!("expected html");
        };

        assert!(html.starts_with("<form id='alipay_submit' name='alipay_submit' action='http://pay.example/go' method='POST'>"));
        assert!(html.contains("<input type='hidden' name='amount' value='1.00'/>"));
        assert!(html.contains("value='it&apos;s'"));
        assert!(html.ends_with("<script>document.forms['alipay_submit'].submit();</script>"));
    }

    #[test]
    fn test_get_builds_redirect() {
        let payload = Params::new().with("a", "1 2").with("b", "x");
        assert_eq!(
            build_pay_html("http://pay.example/go", &payload, HttpMethod::Get).unwrap(),
            PayResponse::Redirect("http://pay.example/go?a=1+2&b=x".into())
        );
        assert_eq!(
            build_pay_html("http://pay.example/?c=Pay", &payload, HttpMethod::Get).unwrap(),
            PayResponse::Redirect("http://pay.example/?c=Pay&a=1+2&b=x".into())
        );
    }
}
